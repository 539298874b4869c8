//! Final model fitting and holdout evaluation

use super::lightgbm::{LightGBMConfig, LightGBMRegressor};
use super::metrics::{mape, RegressionMetrics, MAPE_EPSILON};
use crate::data::TimeSeriesFrame;
use crate::error::{ForecastError, Result};
use crate::timeseries::FeatureMatrix;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Named split-count importance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Fits the final booster on the whole training partition
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: LightGBMConfig,
}

impl ModelTrainer {
    pub fn new(config: LightGBMConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LightGBMConfig {
        &self.config
    }

    /// Fit for the full `n_estimators` budget; no evaluation set is used, so
    /// early stopping never triggers here.
    pub fn fit(&self, train: &FeatureMatrix) -> Result<LightGBMRegressor> {
        if train.is_empty() {
            return Err(ForecastError::InsufficientData(
                "no training rows to fit the final model".into(),
            ));
        }
        let start = Instant::now();
        let mut model = LightGBMRegressor::new(self.config.clone());
        model.fit(train.x(), train.y())?;
        info!(
            rows = train.len(),
            features = train.n_features(),
            trees = model.n_trees(),
            duration_secs = start.elapsed().as_secs_f64(),
            "Final model trained"
        );
        Ok(model)
    }

    /// Holdout metrics; `None` for an empty test partition
    pub fn evaluate(model: &LightGBMRegressor, test: &FeatureMatrix) -> Result<Option<RegressionMetrics>> {
        if test.is_empty() {
            return Ok(None);
        }
        let predictions = model.predict(test.x())?;
        Ok(RegressionMetrics::compute(test.y(), &predictions))
    }
}

/// MAPE of the raw sensor reading (as truth) against the filtered target (as
/// prediction) over frame rows strictly after `cutoff`.
pub fn sensor_noise_mape(
    frame: &TimeSeriesFrame,
    cutoff: NaiveDateTime,
    raw_column: &str,
    target_column: &str,
) -> Result<Option<f64>> {
    let raw = frame.require_channel(raw_column)?;
    let target = frame.require_channel(target_column)?;
    let start = frame.timestamps().partition_point(|t| *t <= cutoff);
    Ok(mape(
        raw[start..].iter().copied(),
        target[start..].iter().copied(),
        MAPE_EPSILON,
    ))
}

/// Importances paired with feature names, highest first
pub fn ranked_importances(model: &LightGBMRegressor, feature_names: &[String]) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = feature_names
        .iter()
        .zip(model.feature_importances())
        .map(|(name, importance)| FeatureImportance {
            feature: name.clone(),
            importance,
        })
        .collect();
    // stable: equal importances keep column order
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked
}
