//! Model training module
//!
//! Provides:
//! - LightGBM-style gradient boosting (leaf-wise trees, early stopping)
//! - Regression metrics (MAE, RMSE, MAPE)
//! - Final model fitting and holdout evaluation
//! - The booster search space and cross-validated search objective

mod models;
pub mod lightgbm;
pub mod metrics;
pub mod trainer;
pub mod tuning;

pub use lightgbm::{LightGBMConfig, LightGBMRegressor};
pub use metrics::{mape, RegressionMetrics, MAPE_EPSILON};
pub use models::Predictor;
pub use trainer::{ranked_importances, sensor_noise_mape, FeatureImportance, ModelTrainer};
pub use tuning::{booster_search_space, config_from_params, CrossValidatedObjective};
