//! Recursive multi-step forecasting state machine

use super::working::{ExogenousPolicy, WorkingSeries};
use super::{Forecast, ForecastPoint};
use crate::data::TimeSeriesFrame;
use crate::error::{ForecastError, Result};
use crate::imputation::{Imputer, MeanImputer};
use crate::timeseries::FeatureBuilder;
use crate::training::Predictor;
use chrono::Duration;
use tracing::{debug, info};

/// Progress of a forecast run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastState {
    /// `step` predictions have been produced so far
    Extending { step: usize },
    Done,
}

/// One in-flight forecast: the working series plus the points produced so far
#[derive(Debug, Clone)]
pub struct ForecastRun {
    series: WorkingSeries,
    state: ForecastState,
    points: Vec<ForecastPoint>,
    imputed_values: usize,
}

impl ForecastRun {
    pub fn state(&self) -> ForecastState {
        self.state
    }

    pub fn series(&self) -> &WorkingSeries {
        &self.series
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    /// Feature values filled from the imputation table so far
    pub fn imputed_values(&self) -> usize {
        self.imputed_values
    }

    pub fn into_forecast(self) -> Forecast {
        Forecast::new(self.points)
    }
}

/// Produces exactly `steps` predictions spaced `interval` apart, starting one
/// interval after the last observed timestamp.
///
/// The model predicts target levels. A tree ensemble never predicts outside
/// the range of targets it was trained on, so a series trending past its
/// training maximum (a ramp, for instance) is forecast as a plateau near that
/// maximum rather than as a continued trend.
pub struct RecursiveForecaster<'a, P: Predictor + ?Sized> {
    builder: &'a FeatureBuilder,
    model: &'a P,
    imputer: &'a MeanImputer,
    interval: Duration,
    steps: usize,
}

impl<'a, P: Predictor + ?Sized> RecursiveForecaster<'a, P> {
    pub fn new(
        builder: &'a FeatureBuilder,
        model: &'a P,
        imputer: &'a MeanImputer,
        interval: Duration,
        steps: usize,
    ) -> Result<Self> {
        if steps == 0 {
            return Err(ForecastError::InvalidParameter {
                name: "steps".into(),
                value: "0".into(),
                reason: "horizon must cover at least one step".into(),
            });
        }
        if interval <= Duration::zero() {
            return Err(ForecastError::InvalidParameter {
                name: "interval".into(),
                value: interval.to_string(),
                reason: "sampling interval must be positive".into(),
            });
        }
        if model.n_features() != builder.n_features() {
            return Err(ForecastError::ShapeError {
                expected: format!("model over {} features", builder.n_features()),
                actual: model.n_features().to_string(),
            });
        }
        Ok(Self {
            builder,
            model,
            imputer,
            interval,
            steps,
        })
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Initial state: the full observed history, no predictions yet
    pub fn start(&self, frame: &TimeSeriesFrame) -> Result<ForecastRun> {
        Ok(ForecastRun {
            series: WorkingSeries::from_frame(frame, self.builder, ExogenousPolicy::LastValueHold)?,
            state: ForecastState::Extending { step: 0 },
            points: Vec::with_capacity(self.steps),
            imputed_values: 0,
        })
    }

    /// Produce one prediction. A finished run is left unchanged.
    pub fn advance(&self, run: &mut ForecastRun) -> Result<ForecastState> {
        let ForecastState::Extending { step } = run.state else {
            return Ok(ForecastState::Done);
        };

        let last = run
            .series
            .last_timestamp()
            .ok_or_else(|| ForecastError::InferenceError("working series is empty".into()))?;
        let at = run.series.append(last + self.interval)?;

        let mut row = self.builder.row_features(&run.series.view(), at);
        let filled = self.imputer.impute_row(&mut row)?;
        let value = self.model.predict_row(&row)?;
        if !value.is_finite() {
            return Err(ForecastError::InferenceError(format!(
                "non-finite prediction at step {}",
                step + 1
            )));
        }
        run.series.set_target(at, value)?;

        let timestamp = last + self.interval;
        run.points.push(ForecastPoint { timestamp, value });
        run.imputed_values += filled;
        debug!(step = step + 1, %timestamp, value, imputed = filled, "Forecast step");

        run.state = if step + 1 >= self.steps {
            ForecastState::Done
        } else {
            ForecastState::Extending { step: step + 1 }
        };
        Ok(run.state)
    }

    /// Run to completion
    pub fn forecast(&self, frame: &TimeSeriesFrame) -> Result<Forecast> {
        let mut run = self.start(frame)?;
        while self.advance(&mut run)? != ForecastState::Done {}
        info!(
            steps = run.points.len(),
            imputed_values = run.imputed_values,
            "Recursive forecast complete"
        );
        Ok(run.into_forecast())
    }
}
