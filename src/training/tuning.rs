//! Booster search space and the cross-validated search objective

use super::lightgbm::{LightGBMConfig, LightGBMRegressor};
use super::metrics::mae;
use crate::error::{ForecastError, Result};
use crate::optimizer::{SearchSpace, TrialParams};
use crate::timeseries::{FeatureMatrix, TimeSeriesSplit};
use ndarray::s;
use tracing::debug;

/// Search space over the booster configuration
pub fn booster_search_space() -> SearchSpace {
    SearchSpace::new()
        .float("learning_rate", 0.01, 0.2)
        .int("num_leaves", 20, 200)
        .int("max_depth", -1, 20)
        .int("min_child_samples", 10, 200)
        .float("min_child_weight", 1e-3, 10.0)
        .float("subsample", 0.6, 1.0)
        .float("colsample_bytree", 0.6, 1.0)
        .float("reg_alpha", 0.0, 2.0)
        .float("reg_lambda", 0.0, 2.0)
}

/// Overlay sampled parameters on `base`. Parameters absent from `params`
/// keep their base value; `max_depth <= 0` means unbounded.
pub fn config_from_params(params: &TrialParams, base: &LightGBMConfig) -> Result<LightGBMConfig> {
    let mut config = base.clone();
    for (name, value) in params {
        let float = || {
            value.as_float().ok_or_else(|| ForecastError::InvalidParameter {
                name: name.clone(),
                value: format!("{:?}", value),
                reason: "expected a number".into(),
            })
        };
        let count = |min: i64| -> Result<usize> {
            match value.as_int() {
                Some(v) if v >= min => Ok(v as usize),
                _ => Err(ForecastError::InvalidParameter {
                    name: name.clone(),
                    value: format!("{:?}", value),
                    reason: format!("expected an integer >= {}", min),
                }),
            }
        };

        match name.as_str() {
            "learning_rate" => config.learning_rate = float()?,
            "num_leaves" => config.num_leaves = count(2)?,
            "max_depth" => {
                config.max_depth = match value.as_int() {
                    Some(d) if d > 0 => Some(d as usize),
                    Some(_) => None,
                    None => return Err(ForecastError::InvalidParameter {
                        name: name.clone(),
                        value: format!("{:?}", value),
                        reason: "expected an integer".into(),
                    }),
                }
            }
            "min_child_samples" => config.min_child_samples = count(1)?,
            "min_child_weight" => config.min_child_weight = float()?,
            "subsample" => config.subsample = float()?,
            "colsample_bytree" => config.colsample_bytree = float()?,
            "reg_alpha" => config.reg_alpha = float()?,
            "reg_lambda" => config.reg_lambda = float()?,
            "n_estimators" => config.n_estimators = count(1)?,
            other => {
                return Err(ForecastError::ConfigError(format!(
                    "unknown booster parameter '{}'",
                    other
                )))
            }
        }
    }
    config.validate()?;
    Ok(config)
}

/// Mean validation MAE of early-stopped fits across expanding-window folds
pub struct CrossValidatedObjective<'a> {
    train: &'a FeatureMatrix,
    folds: Vec<TimeSeriesSplit>,
    base: LightGBMConfig,
}

impl<'a> CrossValidatedObjective<'a> {
    pub fn new(train: &'a FeatureMatrix, folds: Vec<TimeSeriesSplit>, base: LightGBMConfig) -> Result<Self> {
        if folds.is_empty() {
            return Err(ForecastError::ConfigError("no cross-validation folds".into()));
        }
        if let Some(bad) = folds.iter().find(|f| f.validation.end > train.len() || f.train.is_empty()) {
            return Err(ForecastError::ShapeError {
                expected: format!("folds within {} training rows", train.len()),
                actual: format!("fold {} validates on {:?}", bad.fold, bad.validation),
            });
        }
        Ok(Self { train, folds, base })
    }

    pub fn folds(&self) -> &[TimeSeriesSplit] {
        &self.folds
    }

    /// Score one configuration
    pub fn evaluate(&self, params: &TrialParams) -> Result<f64> {
        let config = config_from_params(params, &self.base)?;
        let x = self.train.x();
        let y = self.train.y();

        let mut total = 0.0;
        for split in &self.folds {
            let x_train = x.slice(s![split.train.clone(), ..]).to_owned();
            let y_train = y.slice(s![split.train.clone()]).to_owned();
            let x_val = x.slice(s![split.validation.clone(), ..]).to_owned();
            let y_val = y.slice(s![split.validation.clone()]).to_owned();

            let mut model = LightGBMRegressor::new(config.clone());
            model.fit_with_eval(&x_train, &y_train, Some((&x_val, &y_val)))?;
            let fold_mae = mae(&y_val, &model.predict(&x_val)?);

            debug!(
                fold = split.fold,
                train_rows = x_train.nrows(),
                val_rows = x_val.nrows(),
                best_iteration = ?model.best_iteration(),
                mae = fold_mae,
                "Fold evaluated"
            );
            total += fold_mae;
        }
        Ok(total / self.folds.len() as f64)
    }
}
