//! End-to-end forecasting run

use super::config::PipelineConfig;
use crate::data::{horizon_steps, ForecastWriter, TimeSeriesFrame, TimeSeriesLoader};
use crate::error::{ForecastError, Result};
use crate::forecast::{Forecast, ForecastSummary, RecursiveForecaster};
use crate::imputation::{Imputer, MeanImputer};
use crate::optimizer::{HyperparameterSearch, Study, TrialParams};
use crate::timeseries::{FeatureBuilder, Splitter};
use crate::training::{
    booster_search_space, config_from_params, ranked_importances, sensor_noise_mape,
    CrossValidatedObjective, FeatureImportance, ModelTrainer, RegressionMetrics,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

const TOP_FEATURES: usize = 10;

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub rows: usize,
    pub interval_secs: i64,
    pub horizon_steps: usize,
    pub feature_names: Vec<String>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub cutoff: NaiveDateTime,
    pub best_params: TrialParams,
    pub best_cv_mae: f64,
    pub completed_trials: usize,
    pub failed_trials: usize,
    /// Holdout metrics; absent when the holdout window is empty
    pub holdout: Option<RegressionMetrics>,
    /// Raw vs filtered target MAPE over the holdout window
    pub sensor_mape: Option<f64>,
    pub top_features: Vec<FeatureImportance>,
    pub forecast: Option<ForecastSummary>,
    pub duration_secs: f64,
}

impl PipelineReport {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub report: PipelineReport,
    pub forecast: Forecast,
    pub study: Study,
}

/// Dataset overview without training anything
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub rows: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub interval_secs: i64,
    pub horizon_steps: usize,
    pub exogenous: Vec<String>,
    pub n_features: usize,
    pub valid_rows: usize,
}

pub struct ForecastPipeline {
    config: PipelineConfig,
}

impl ForecastPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn input(&self) -> Result<&Path> {
        self.config
            .input
            .as_deref()
            .ok_or_else(|| ForecastError::ConfigError("no input file configured".into()))
    }

    /// Load the input with the target and raw-target columns mandatory
    pub fn load(&self) -> Result<TimeSeriesFrame> {
        let path = self.input()?;
        let loader = TimeSeriesLoader::new(self.config.timestamp_column.clone());
        let frame = loader.load_csv(
            path,
            &[self.config.target_column.as_str(), self.config.raw_target_column.as_str()],
        )?;
        info!(path = %path.display(), rows = frame.len(), channels = frame.channels().len(), "Data loaded");
        Ok(frame)
    }

    /// Rows, span, sampling interval and valid feature rows of the input
    pub fn inspect(&self) -> Result<DatasetInfo> {
        let frame = self.load()?;
        let interval = frame.sampling_interval()?;
        let builder = self.builder(&frame)?;
        let matrix = builder.build(&frame)?;
        let (start, end) = frame
            .first_timestamp()
            .zip(frame.last_timestamp())
            .ok_or_else(|| ForecastError::InsufficientData("input has no rows".into()))?;

        Ok(DatasetInfo {
            rows: frame.len(),
            start,
            end,
            interval_secs: interval.num_seconds(),
            horizon_steps: horizon_steps(self.config.horizon(), interval)?,
            exogenous: builder.exogenous().to_vec(),
            n_features: builder.n_features(),
            valid_rows: matrix.len(),
        })
    }

    fn builder(&self, frame: &TimeSeriesFrame) -> Result<FeatureBuilder> {
        FeatureBuilder::for_frame(
            self.config.features.clone(),
            &self.config.target_column,
            &self.config.exogenous_columns,
            frame,
        )
    }

    /// Load, search, fit, evaluate, forecast and write.
    ///
    /// The forecast file (and report / study, when configured) is only
    /// written once every earlier stage has succeeded.
    pub fn run(&self) -> Result<PipelineOutput> {
        let frame = self.load()?;
        self.run_frame(&frame)
    }

    /// Same as [`run`](Self::run) on an already loaded frame
    pub fn run_frame(&self, frame: &TimeSeriesFrame) -> Result<PipelineOutput> {
        let start = Instant::now();
        let config = &self.config;
        frame.require_channel(&config.target_column)?;
        frame.require_channel(&config.raw_target_column)?;

        let interval = frame.sampling_interval()?;
        let steps = horizon_steps(config.horizon(), interval)?;
        info!(interval_secs = interval.num_seconds(), horizon_steps = steps, "Sampling interval inferred");

        // features
        let warmup = config.features.warmup_rows();
        if frame.len() <= warmup {
            return Err(ForecastError::InsufficientData(format!(
                "{} rows of history, at least {} needed for the configured lags and windows",
                frame.len(),
                warmup + 1
            )));
        }
        let builder = self.builder(frame)?;
        let matrix = builder.build(frame)?;
        if matrix.is_empty() {
            return Err(ForecastError::InsufficientData(
                "no row has a complete feature history".into(),
            ));
        }
        info!(rows = matrix.len(), features = matrix.n_features(), "Feature matrix built");

        // split
        let splitter = Splitter::with_holdout_days(config.holdout_days, config.cv_folds)?;
        let split = splitter.split(&matrix)?;
        if split.test.is_empty() {
            warn!(cutoff = %split.cutoff, "Holdout window is empty, metrics will be absent");
        }
        info!(
            train_rows = split.train.len(),
            test_rows = split.test.len(),
            cutoff = %split.cutoff,
            "Train/test split"
        );
        let folds = splitter.folds(split.train.len())?;

        // search
        let objective = CrossValidatedObjective::new(&split.train, folds, config.search_booster())?;
        let mut search = HyperparameterSearch::new(config.optimization(), booster_search_space())?;
        search.optimize(|params| objective.evaluate(params))?;
        let study = search.into_study();
        let best = study
            .best_trial()
            .ok_or_else(|| ForecastError::OptimizationError("search produced no result".into()))?;
        info!(
            trial = best.trial_id,
            cv_mae = best.value,
            failed = study.n_failed(),
            "Best configuration selected"
        );

        // final fit and evaluation
        let final_config = config_from_params(&best.params, &config.final_booster())?;
        let model = ModelTrainer::new(final_config).fit(&split.train)?;
        let holdout = ModelTrainer::evaluate(&model, &split.test)?;
        if let Some(m) = &holdout {
            info!(mae = m.mae, rmse = m.rmse, mape = ?m.mape, "Holdout metrics");
        }
        let sensor_mape = sensor_noise_mape(frame, split.cutoff, &config.raw_target_column, &config.target_column)?;
        info!(sensor_mape = ?sensor_mape, "Raw vs filtered target MAPE");

        // forecast
        let mut imputer = MeanImputer::new();
        imputer.fit(split.train.x())?;
        let forecaster = RecursiveForecaster::new(&builder, &model, &imputer, interval, steps)?;
        let forecast = forecaster.forecast(frame)?;

        let mut top_features = ranked_importances(&model, builder.feature_names());
        top_features.truncate(TOP_FEATURES);

        let report = PipelineReport {
            input: config.input.clone().unwrap_or_default(),
            output: config.output.clone(),
            rows: frame.len(),
            interval_secs: interval.num_seconds(),
            horizon_steps: steps,
            feature_names: builder.feature_names().to_vec(),
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            cutoff: split.cutoff,
            best_params: best.params.clone(),
            best_cv_mae: best.value,
            completed_trials: study.n_completed(),
            failed_trials: study.n_failed(),
            holdout,
            sensor_mape,
            top_features,
            forecast: forecast.summary(),
            duration_secs: start.elapsed().as_secs_f64(),
        };

        if let Some(path) = &config.study {
            study.save(path)?;
            info!(path = %path.display(), "Study saved");
        }
        if let Some(path) = &config.report {
            report.save(path)?;
            info!(path = %path.display(), "Report saved");
        }
        // written last: a forecast file on disk means the whole run succeeded
        ForecastWriter::new(&config.target_column)
            .with_timestamp_column(config.timestamp_column.clone())
            .write_csv(&forecast, &config.output)?;

        Ok(PipelineOutput { report, forecast, study })
    }
}
