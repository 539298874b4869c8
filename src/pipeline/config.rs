//! Pipeline configuration

use crate::error::{ForecastError, Result};
use crate::optimizer::{OptimizationConfig, SamplerType};
use crate::timeseries::FeatureConfig;
use crate::training::LightGBMConfig;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_EXOGENOUS: [&str; 8] = [
    "Dissolved Oxygen_Kalman",
    "Salinity_Kalman",
    "Temperature_Kalman",
    "Turbidity_Kalman",
    "pH_Kalman",
    "W_Relative Humidity",
    "W_Shortwave Radiation",
    "W_Temperature",
];

/// Configuration for a full load → search → fit → forecast run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input CSV
    pub input: Option<PathBuf>,
    /// Forecast CSV
    pub output: PathBuf,
    pub timestamp_column: String,
    /// Filtered channel the model predicts
    pub target_column: String,
    /// Unfiltered reading of the same sensor, used for the noise diagnostic
    pub raw_target_column: String,
    pub exogenous_columns: Vec<String>,
    pub features: FeatureConfig,

    /// Trailing holdout length
    pub holdout_days: f64,
    pub cv_folds: usize,

    pub n_trials: usize,
    pub sampler: SamplerType,
    pub seed: u64,
    pub timeout_secs: Option<f64>,
    /// Trials evaluated in parallel per batch
    pub n_jobs: usize,
    /// Stop the search after this many trials without improvement
    pub patience: Option<usize>,

    /// Boosting round budget
    pub n_estimators: usize,
    /// Rounds without validation improvement before a CV fit stops
    pub early_stopping_rounds: usize,

    pub horizon_days: f64,

    /// Optional JSON run report
    pub report: Option<PathBuf>,
    /// Optional JSON dump of every search trial
    pub study: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: PathBuf::from("future_week_forecast.csv"),
            timestamp_column: "Timestamp".to_string(),
            target_column: "Chlorophyll_Kalman".to_string(),
            raw_target_column: "Chlorophyll".to_string(),
            exogenous_columns: DEFAULT_EXOGENOUS.iter().map(|s| s.to_string()).collect(),
            features: FeatureConfig::default(),
            holdout_days: 30.0,
            cv_folds: 5,
            n_trials: 30,
            sampler: SamplerType::TPE,
            seed: 42,
            timeout_secs: None,
            n_jobs: 1,
            patience: None,
            n_estimators: 1000,
            early_stopping_rounds: 50,
            horizon_days: 7.0,
            report: None,
            study: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ForecastError::ConfigError(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input = Some(path.into());
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = path.into();
        self
    }

    pub fn with_target(mut self, target: impl Into<String>, raw: impl Into<String>) -> Self {
        self.target_column = target.into();
        self.raw_target_column = raw.into();
        self
    }

    pub fn with_exogenous(mut self, columns: Vec<String>) -> Self {
        self.exogenous_columns = columns;
        self
    }

    pub fn with_features(mut self, features: FeatureConfig) -> Self {
        self.features = features;
        self
    }

    pub fn with_holdout_days(mut self, days: f64) -> Self {
        self.holdout_days = days;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_early_stopping_rounds(mut self, rounds: usize) -> Self {
        self.early_stopping_rounds = rounds;
        self
    }

    pub fn with_horizon_days(mut self, days: f64) -> Self {
        self.horizon_days = days;
        self
    }

    pub fn with_n_jobs(mut self, n: usize) -> Self {
        self.n_jobs = n;
        self
    }

    pub fn with_report(mut self, path: impl Into<PathBuf>) -> Self {
        self.report = Some(path.into());
        self
    }

    pub fn with_study(mut self, path: impl Into<PathBuf>) -> Self {
        self.study = Some(path.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| ForecastError::InvalidParameter {
            name: name.into(),
            value,
            reason: reason.into(),
        };

        if self.target_column.trim().is_empty() {
            return Err(ForecastError::ConfigError("target column name is empty".into()));
        }
        if self.raw_target_column.trim().is_empty() {
            return Err(ForecastError::ConfigError("raw target column name is empty".into()));
        }
        if self.timestamp_column.trim().is_empty() {
            return Err(ForecastError::ConfigError("timestamp column name is empty".into()));
        }
        self.features.validate()?;
        if !(self.holdout_days.is_finite() && self.holdout_days >= 0.0) {
            return Err(invalid("holdout_days", self.holdout_days.to_string(), "must be non-negative"));
        }
        if self.cv_folds < 2 {
            return Err(invalid("cv_folds", self.cv_folds.to_string(), "at least 2 folds are required"));
        }
        if !(self.horizon_days.is_finite() && self.horizon_days > 0.0) {
            return Err(invalid("horizon_days", self.horizon_days.to_string(), "must be positive"));
        }
        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", "0".into(), "must be at least 1"));
        }
        if self.early_stopping_rounds == 0 {
            return Err(invalid("early_stopping_rounds", "0".into(), "must be at least 1"));
        }
        self.optimization().validate()
    }

    pub fn horizon(&self) -> Duration {
        Duration::milliseconds((self.horizon_days * 86_400_000.0).round() as i64)
    }

    pub fn optimization(&self) -> OptimizationConfig {
        let mut config = OptimizationConfig::new()
            .with_n_trials(self.n_trials)
            .with_sampler(self.sampler)
            .with_n_jobs(self.n_jobs)
            .with_seed(self.seed);
        config.timeout_secs = self.timeout_secs;
        config.early_stopping_patience = self.patience;
        config
    }

    /// Booster settings shared by every search trial
    pub fn search_booster(&self) -> LightGBMConfig {
        LightGBMConfig {
            n_estimators: self.n_estimators,
            early_stopping_rounds: Some(self.early_stopping_rounds),
            random_state: self.seed,
            ..LightGBMConfig::default()
        }
    }

    /// Booster settings for the final fit, which always runs the full budget
    pub fn final_booster(&self) -> LightGBMConfig {
        LightGBMConfig {
            early_stopping_rounds: None,
            ..self.search_booster()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.target_column, "Chlorophyll_Kalman");
        assert_eq!(config.raw_target_column, "Chlorophyll");
        assert_eq!(config.exogenous_columns.len(), 8);
        assert_eq!(config.holdout_days, 30.0);
        assert_eq!(config.n_trials, 30);
        assert_eq!(config.horizon(), Duration::days(7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"n_trials": 5, "features": {"target_lags": [1, 3]}}"#).unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.n_trials, 5);
        assert_eq!(config.features.target_lags, vec![1, 3]);
        assert_eq!(config.features.target_windows, vec![6, 72, 144]);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = PipelineConfig::new().with_n_trials(3).with_report("report.json");
        config.save(&path).unwrap();
        assert_eq!(PipelineConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(PipelineConfig::new().with_cv_folds(1).validate().is_err());
        assert!(PipelineConfig::new().with_n_trials(0).validate().is_err());
        assert!(PipelineConfig::new().with_horizon_days(0.0).validate().is_err());
        assert!(PipelineConfig::new().with_holdout_days(-1.0).validate().is_err());
        assert!(PipelineConfig::new().with_target("", "raw").validate().is_err());
        let zero_lag = FeatureConfig::default().with_target_lags(vec![0]);
        assert!(PipelineConfig::new().with_features(zero_lag).validate().is_err());
    }

    #[test]
    fn test_booster_configs() {
        let config = PipelineConfig::new().with_seed(7).with_n_estimators(200);
        let search = config.search_booster();
        assert_eq!(search.early_stopping_rounds, Some(50));
        assert_eq!(search.random_state, 7);
        assert_eq!(config.final_booster().early_stopping_rounds, None);
        assert_eq!(config.final_booster().n_estimators, 200);
    }

    #[test]
    fn test_missing_config_file() {
        let result = PipelineConfig::from_json_file(Path::new("/nonexistent/chlorocast.json"));
        assert!(matches!(result, Err(ForecastError::ConfigError(_))));
    }
}
