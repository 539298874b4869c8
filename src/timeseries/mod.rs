//! Time series module
//!
//! Supervised-learning view of a sensor series:
//! - Shifted lag/rolling primitives that never read the current row
//! - Target, difference, exogenous and calendar features
//! - Trailing holdout split and expanding-window cross-validation

mod features;
mod validation;
pub mod window;

pub use features::{FeatureBuilder, FeatureConfig, FeatureMatrix, SeriesView};
pub use validation::{ExpandingWindowCV, HoldoutSplit, Splitter, TimeSeriesSplit};
pub use window::{first_difference, Shift, WindowStat};
