//! Imputation module
//!
//! Column-mean imputation fitted once on the training partition and applied
//! unchanged to every row produced during forecasting.

mod mean;

pub use mean::MeanImputer;

use crate::error::Result;
use ndarray::Array2;

/// Trait for imputers
pub trait Imputer: Send + Sync {
    /// Fit the imputer on data with missing values
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Fill the missing entries of a single row in place
    fn impute_row(&self, row: &mut [f64]) -> Result<usize>;
}

/// Check if value is missing (NaN or infinite)
#[inline]
pub fn is_missing(v: f64) -> bool {
    !v.is_finite()
}
