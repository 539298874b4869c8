//! Hyperparameter optimization module
//!
//! Provides:
//! - Search spaces over float and integer parameters
//! - Tree-structured Parzen Estimator (TPE) and random samplers
//! - A batched, reproducible study runner with timeout and patience

mod config;
mod optimizer;
mod samplers;
mod search_space;

pub use config::OptimizationConfig;
pub use optimizer::{HyperparameterSearch, Study, TrialResult};
pub use samplers::{create_sampler, RandomSampler, Sampler, SamplerType, TPESampler};
pub use search_space::{Parameter, ParameterType, ParameterValue, SearchSpace, TrialParams};
