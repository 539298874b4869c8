//! Data module
//!
//! The external collaborators of the pipeline:
//! - [`TimeSeriesFrame`] - timestamp-indexed multivariate series
//! - [`TimeSeriesLoader`] - CSV ingestion
//! - [`ForecastWriter`] - forecast artifact output

mod frame;
mod loader;
mod writer;

pub use frame::{horizon_steps, infer_sampling_interval, Channel, TimeSeriesFrame};
pub use loader::{parse_timestamp, TimeSeriesLoader};
pub use writer::{ForecastWriter, TIMESTAMP_FORMAT};
