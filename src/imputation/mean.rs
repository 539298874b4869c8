//! Fixed column-mean imputation table

use super::{is_missing, Imputer};
use crate::error::{ForecastError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeanImputer {
    means: Option<Vec<f64>>,
}

impl MeanImputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-column means learned by `fit`
    pub fn means(&self) -> Option<&[f64]> {
        self.means.as_deref()
    }

    fn fitted(&self, n_cols: usize) -> Result<&[f64]> {
        let means = self.means.as_deref().ok_or(ForecastError::ModelNotFitted)?;
        if means.len() != n_cols {
            return Err(ForecastError::ShapeError {
                expected: format!("{} columns", means.len()),
                actual: n_cols.to_string(),
            });
        }
        Ok(means)
    }
}

impl Imputer for MeanImputer {
    /// Mean of the defined values in each column; a column with no defined
    /// value imputes 0.
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(ForecastError::InsufficientData(
                "cannot fit imputation table on an empty matrix".into(),
            ));
        }
        let means = x
            .columns()
            .into_iter()
            .map(|col| {
                let (sum, count) = col
                    .iter()
                    .filter(|v| !is_missing(**v))
                    .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
                if count > 0 { sum / count as f64 } else { 0.0 }
            })
            .collect();
        self.means = Some(means);
        Ok(())
    }

    fn impute_row(&self, row: &mut [f64]) -> Result<usize> {
        let means = self.fitted(row.len())?;
        let mut filled = 0;
        for (v, m) in row.iter_mut().zip(means) {
            if is_missing(*v) {
                *v = *m;
                filled += 1;
            }
        }
        Ok(filled)
    }
}
