//! Chlorocast - offline chlorophyll forecasting
//!
//! Turns a regularly sampled multivariate sensor series into a multi-day
//! forecast of one channel:
//! - Leakage-safe lag, rolling, difference and calendar features
//! - Trailing holdout and expanding-window cross-validation
//! - TPE hyperparameter search over a LightGBM-style booster
//! - Recursive multi-step forecasting written to CSV
//!
//! # Modules
//!
//! - [`data`] - Time series frame, CSV loader and forecast writer
//! - [`timeseries`] - Feature construction and temporal splits
//! - [`training`] - Gradient boosting, metrics and the final trainer
//! - [`optimizer`] - Search space, samplers and the study runner
//! - [`imputation`] - Training-mean imputation table
//! - [`forecast`] - Recursive forecaster
//! - [`pipeline`] - Configuration and end-to-end runner
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data and features
pub mod data;
pub mod timeseries;

// Modelling
pub mod training;
pub mod optimizer;
pub mod imputation;
pub mod forecast;

// Orchestration
pub mod pipeline;
pub mod cli;

pub use error::{ForecastError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{ForecastError, Result};

    pub use crate::data::{ForecastWriter, TimeSeriesFrame, TimeSeriesLoader};
    pub use crate::timeseries::{FeatureBuilder, FeatureConfig, FeatureMatrix, Splitter};
    pub use crate::training::{LightGBMConfig, LightGBMRegressor, ModelTrainer, Predictor, RegressionMetrics};
    pub use crate::optimizer::{HyperparameterSearch, OptimizationConfig, SearchSpace};
    pub use crate::imputation::{Imputer, MeanImputer};
    pub use crate::forecast::{Forecast, ForecastPoint, RecursiveForecaster};
    pub use crate::pipeline::{ForecastPipeline, PipelineConfig, PipelineReport};
}
