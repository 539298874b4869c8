//! Regression metrics for holdout reporting

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Values at or below this magnitude are excluded from MAPE
pub const MAPE_EPSILON: f64 = 1e-6;

/// Metrics for model evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error, in percent. `None` when no true value
    /// exceeds the epsilon.
    pub mape: Option<f64>,
    /// Number of evaluated rows
    pub n_samples: usize,
}

impl RegressionMetrics {
    /// Compute regression metrics; `None` for empty input
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Option<Self> {
        if y_true.is_empty() || y_true.len() != y_pred.len() {
            return None;
        }
        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();

        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
        let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;

        Some(Self {
            mae,
            rmse: mse.sqrt(),
            mape: mape(y_true.iter().copied(), y_pred.iter().copied(), MAPE_EPSILON),
            n_samples: y_true.len(),
        })
    }
}

/// Mean absolute error
pub fn mae(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64
}

/// Mean absolute percentage error over pairs with `|truth| > eps`.
///
/// Pairs where either side is undefined are ignored.
pub fn mape(
    y_true: impl IntoIterator<Item = f64>,
    y_pred: impl IntoIterator<Item = f64>,
    eps: f64,
) -> Option<f64> {
    let (sum, count) = y_true
        .into_iter()
        .zip(y_pred)
        .filter(|(t, p)| t.is_finite() && p.is_finite() && t.abs() > eps)
        .fold((0.0, 0usize), |(sum, count), (t, p)| {
            (sum + ((t - p) / t).abs(), count + 1)
        });
    (count > 0).then(|| 100.0 * sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 4.0, 5.0];
        let y_pred = array![2.0, 2.0, 2.0, 5.0];

        let metrics = RegressionMetrics::compute(&y_true, &y_pred).unwrap();
        assert!((metrics.mae - 0.75).abs() < 1e-12);
        assert!((metrics.rmse - (5.0f64 / 4.0).sqrt()).abs() < 1e-12);
        // (100% + 0 + 50% + 0) / 4
        assert!((metrics.mape.unwrap() - 37.5).abs() < 1e-9);
        assert_eq!(metrics.n_samples, 4);
    }

    #[test]
    fn test_mape_masks_near_zero_truth() {
        let value = mape([0.0, 1e-9, 2.0], [5.0, 5.0, 1.0], MAPE_EPSILON).unwrap();
        assert!((value - 50.0).abs() < 1e-9);
        assert!(mape([0.0, 0.0], [1.0, 1.0], MAPE_EPSILON).is_none());
    }

    #[test]
    fn test_empty_metrics() {
        let empty = Array1::<f64>::zeros(0);
        assert!(RegressionMetrics::compute(&empty, &empty).is_none());
    }
}
