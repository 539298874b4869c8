//! Model traits

use crate::error::Result;

/// A fitted single-step regressor, consumed one feature row at a time.
///
/// The recursive forecaster only needs this, so it can be driven by any
/// model (or a stub in tests).
pub trait Predictor: Send + Sync {
    /// Predict the target for one feature row
    fn predict_row(&self, features: &[f64]) -> Result<f64>;

    /// Width of the feature rows this predictor accepts
    fn n_features(&self) -> usize;
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn predict_row(&self, features: &[f64]) -> Result<f64> {
        (**self).predict_row(features)
    }

    fn n_features(&self) -> usize {
        (**self).n_features()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SumModel;

    impl Predictor for SumModel {
        fn predict_row(&self, features: &[f64]) -> Result<f64> {
            Ok(features.iter().sum())
        }

        fn n_features(&self) -> usize {
            2
        }
    }

    #[test]
    fn test_boxed_predictor_delegates() {
        let model: Box<dyn Predictor> = Box::new(SumModel);
        assert_eq!(model.predict_row(&[1.0, 2.5]).unwrap(), 3.5);
        assert_eq!(model.n_features(), 2);
    }
}
