//! Forecasting pipeline
//!
//! Wires loader, features, split, search, final fit, recursive forecast and
//! writer together behind a single [`PipelineConfig`].

mod config;
mod runner;

pub use config::{PipelineConfig, DEFAULT_EXOGENOUS};
pub use runner::{DatasetInfo, ForecastPipeline, PipelineOutput, PipelineReport};
