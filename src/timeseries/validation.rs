//! Temporal partitioning: trailing holdout and expanding-window CV
//!
//! Nothing here shuffles. Every validation or test row is strictly later than
//! every row it is evaluated against.

use super::features::FeatureMatrix;
use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One expanding-window fold, as row ranges into the training partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesSplit {
    /// Training rows (always start at 0)
    pub train: Range<usize>,
    /// Validation rows, immediately after `train`
    pub validation: Range<usize>,
    /// Fold number
    pub fold: usize,
}

/// Expanding-window cross-validator.
///
/// With `n` samples and `k` splits the validation block size is
/// `n / (k + 1)`; the last fold validates on the final block and every fold
/// trains on all rows before its block.
#[derive(Debug, Clone)]
pub struct ExpandingWindowCV {
    n_splits: usize,
}

impl ExpandingWindowCV {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<TimeSeriesSplit>> {
        if self.n_splits < 2 {
            return Err(ForecastError::InvalidParameter {
                name: "cv_folds".into(),
                value: self.n_splits.to_string(),
                reason: "at least 2 folds are required".into(),
            });
        }

        let block = n_samples / (self.n_splits + 1);
        if block == 0 {
            return Err(ForecastError::InsufficientData(format!(
                "{} training rows cannot form {} validation folds",
                n_samples, self.n_splits
            )));
        }

        let first_start = n_samples - self.n_splits * block;
        Ok((0..self.n_splits)
            .map(|fold| {
                let start = first_start + fold * block;
                TimeSeriesSplit {
                    train: 0..start,
                    validation: start..start + block,
                    fold,
                }
            })
            .collect())
    }
}

/// Trailing holdout partition
#[derive(Debug, Clone)]
pub struct HoldoutSplit {
    pub train: FeatureMatrix,
    pub test: FeatureMatrix,
    /// Train rows are at or before the cutoff, test rows strictly after it
    pub cutoff: NaiveDateTime,
}

/// Splits a feature matrix into train/test by time and generates CV folds
/// over the training partition.
#[derive(Debug, Clone)]
pub struct Splitter {
    holdout: Duration,
    cv: ExpandingWindowCV,
}

impl Splitter {
    pub fn new(holdout: Duration, n_splits: usize) -> Self {
        Self {
            holdout,
            cv: ExpandingWindowCV::new(n_splits),
        }
    }

    /// Holdout length given in (possibly fractional) days
    pub fn with_holdout_days(holdout_days: f64, n_splits: usize) -> Result<Self> {
        if !holdout_days.is_finite() || holdout_days < 0.0 {
            return Err(ForecastError::InvalidParameter {
                name: "holdout_days".into(),
                value: holdout_days.to_string(),
                reason: "must be a non-negative number".into(),
            });
        }
        let millis = (holdout_days * 86_400_000.0).round();
        let holdout = (millis < i64::MAX as f64)
            .then(|| Duration::try_milliseconds(millis as i64))
            .flatten()
            .ok_or_else(|| ForecastError::InvalidParameter {
                name: "holdout_days".into(),
                value: holdout_days.to_string(),
                reason: "holdout is too long to represent".into(),
            })?;
        Ok(Self::new(holdout, n_splits))
    }

    pub fn holdout(&self) -> Duration {
        self.holdout
    }

    /// Partition by timestamp: cutoff = last timestamp - holdout.
    ///
    /// An empty training partition is fatal; an empty test partition is not.
    pub fn split(&self, matrix: &FeatureMatrix) -> Result<HoldoutSplit> {
        let last = matrix.last_timestamp().ok_or_else(|| {
            ForecastError::InsufficientData("feature matrix has no valid rows".to_string())
        })?;
        let cutoff = last.checked_sub_signed(self.holdout).ok_or_else(|| {
            ForecastError::InsufficientData(format!(
                "holdout of {} days reaches before any representable timestamp",
                self.holdout.num_days()
            ))
        })?;

        // timestamps are sorted, so the partition is a single boundary
        let boundary = matrix.timestamps().partition_point(|t| *t <= cutoff);
        if boundary == 0 {
            return Err(ForecastError::InsufficientData(format!(
                "no valid training rows at or before cutoff {}",
                cutoff
            )));
        }

        Ok(HoldoutSplit {
            train: matrix.rows(0..boundary),
            test: matrix.rows(boundary..matrix.len()),
            cutoff,
        })
    }

    /// Expanding-window folds over `n_train` training rows
    pub fn folds(&self, n_train: usize) -> Result<Vec<TimeSeriesSplit>> {
        self.cv.split(n_train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::{Array1, Array2};

    fn hourly_matrix(n: usize) -> FeatureMatrix {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let stamps = (0..n).map(|i| start + Duration::hours(i as i64)).collect();
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i + j) as f64);
        let y = Array1::from_shape_fn(n, |i| i as f64);
        FeatureMatrix::new(vec!["a".into(), "b".into()], stamps, x, y).unwrap()
    }

    #[test]
    fn test_expanding_folds_layout() {
        let splits = ExpandingWindowCV::new(5).split(100).unwrap();
        assert_eq!(splits.len(), 5);
        // block = 100 / 6 = 16, first validation block starts at 100 - 80 = 20
        assert_eq!(splits[0].train, 0..20);
        assert_eq!(splits[0].validation, 20..36);
        assert_eq!(splits[4].validation, 84..100);
    }

    #[test]
    fn test_expanding_folds_are_ordered_and_growing() {
        let splits = ExpandingWindowCV::new(4).split(57).unwrap();
        for split in &splits {
            assert!(split.train.end <= split.validation.start);
        }
        for pair in splits.windows(2) {
            assert!(pair[1].train.end > pair[0].train.end);
            assert_eq!(pair[1].train.start, pair[0].train.start);
        }
    }

    #[test]
    fn test_expanding_too_few_rows() {
        assert!(matches!(
            ExpandingWindowCV::new(5).split(5),
            Err(ForecastError::InsufficientData(_))
        ));
        assert!(ExpandingWindowCV::new(1).split(100).is_err());
    }

    #[test]
    fn test_holdout_is_strictly_later() {
        let matrix = hourly_matrix(24 * 10);
        let splitter = Splitter::with_holdout_days(2.0, 3).unwrap();
        let split = splitter.split(&matrix).unwrap();

        assert_eq!(split.test.len(), 48);
        assert_eq!(split.train.len(), 24 * 8);
        let last_train = split.train.last_timestamp().unwrap();
        let first_test = split.test.first_timestamp().unwrap();
        assert!(last_train < first_test);
        assert!(last_train <= split.cutoff && first_test > split.cutoff);
    }

    #[test]
    fn test_holdout_longer_than_history_is_fatal() {
        let matrix = hourly_matrix(24);
        let splitter = Splitter::with_holdout_days(30.0, 3).unwrap();
        assert!(matches!(
            splitter.split(&matrix),
            Err(ForecastError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_huge_holdout_is_an_error() {
        let matrix = hourly_matrix(48);
        let splitter = Splitter::with_holdout_days(1e9, 3).unwrap();
        assert!(matches!(
            splitter.split(&matrix),
            Err(ForecastError::InsufficientData(_))
        ));
        assert!(matches!(
            Splitter::with_holdout_days(1e30, 3),
            Err(ForecastError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_zero_holdout_leaves_empty_test() {
        let matrix = hourly_matrix(10);
        let splitter = Splitter::with_holdout_days(0.0, 3).unwrap();
        let split = splitter.split(&matrix).unwrap();
        assert_eq!(split.train.len(), 10);
        assert!(split.test.is_empty());
    }
}
