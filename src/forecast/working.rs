//! Append-only working copy of the series used during forecasting

use crate::data::TimeSeriesFrame;
use crate::error::{ForecastError, Result};
use crate::timeseries::{first_difference, FeatureBuilder, SeriesView};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// How exogenous channels are filled for rows beyond the observed history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExogenousPolicy {
    /// Copy the previous row's value (undefined stays undefined)
    #[default]
    LastValueHold,
}

/// Owned timestamps, target, target difference and exogenous channels.
///
/// Observed rows are never modified. Appended rows start with an undefined
/// target that may be written exactly once.
#[derive(Debug, Clone)]
pub struct WorkingSeries {
    timestamps: Vec<NaiveDateTime>,
    target: Vec<f64>,
    difference: Vec<f64>,
    exogenous: Vec<Vec<f64>>,
    n_observed: usize,
    policy: ExogenousPolicy,
}

impl WorkingSeries {
    /// Copy the channels `builder` reads out of `frame`
    pub fn from_frame(frame: &TimeSeriesFrame, builder: &FeatureBuilder, policy: ExogenousPolicy) -> Result<Self> {
        if frame.is_empty() {
            return Err(ForecastError::InsufficientData("cannot forecast from an empty series".into()));
        }
        let target = frame.require_channel(builder.target())?.to_vec();
        let exogenous = builder
            .exogenous()
            .iter()
            .map(|name| frame.require_channel(name).map(<[f64]>::to_vec))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            timestamps: frame.timestamps().to_vec(),
            difference: first_difference(&target),
            target,
            exogenous,
            n_observed: frame.len(),
            policy,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn n_observed(&self) -> usize {
        self.n_observed
    }

    pub fn n_appended(&self) -> usize {
        self.len() - self.n_observed
    }

    pub fn policy(&self) -> ExogenousPolicy {
        self.policy
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied()
    }

    pub fn target(&self) -> &[f64] {
        &self.target
    }

    /// Borrowed view for [`FeatureBuilder::row_features`]
    pub fn view(&self) -> SeriesView<'_> {
        SeriesView {
            timestamps: &self.timestamps,
            target: &self.target,
            difference: &self.difference,
            exogenous: self.exogenous.iter().map(Vec::as_slice).collect(),
        }
    }

    /// Append a row with an undefined target, returning its index
    pub fn append(&mut self, timestamp: NaiveDateTime) -> Result<usize> {
        let last = self
            .last_timestamp()
            .ok_or_else(|| ForecastError::InferenceError("working series is empty".into()))?;
        if timestamp <= last {
            return Err(ForecastError::InferenceError(format!(
                "appended timestamp {} is not after {}",
                timestamp, last
            )));
        }

        match self.policy {
            ExogenousPolicy::LastValueHold => {
                for channel in &mut self.exogenous {
                    let held = channel.last().copied().unwrap_or(f64::NAN);
                    channel.push(held);
                }
            }
        }
        self.timestamps.push(timestamp);
        self.target.push(f64::NAN);
        self.difference.push(f64::NAN);
        Ok(self.len() - 1)
    }

    /// Write the predicted target of an appended row
    pub fn set_target(&mut self, at: usize, value: f64) -> Result<()> {
        if at < self.n_observed || at >= self.len() {
            return Err(ForecastError::InferenceError(format!(
                "row {} is not an appended row",
                at
            )));
        }
        if !self.target[at].is_nan() {
            return Err(ForecastError::InferenceError(format!("row {} already has a target", at)));
        }
        self.target[at] = value;
        self.difference[at] = value - self.target[at - 1];
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Channel;
    use crate::timeseries::FeatureConfig;
    use chrono::{Duration, NaiveDate};

    fn setup() -> (TimeSeriesFrame, FeatureBuilder) {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let stamps = (0..4).map(|i| start + Duration::hours(i)).collect();
        let frame = TimeSeriesFrame::new(
            stamps,
            vec![
                Channel::new("y", vec![1.0, 2.0, 4.0, 7.0]),
                Channel::new("temp", vec![10.0, 11.0, 12.0, 13.0]),
            ],
        )
        .unwrap();
        let builder = FeatureBuilder::for_frame(FeatureConfig::default(), "y", &["temp".into()], &frame).unwrap();
        (frame, builder)
    }

    #[test]
    fn test_append_holds_last_exogenous_value() {
        let (frame, builder) = setup();
        let mut series = WorkingSeries::from_frame(&frame, &builder, ExogenousPolicy::LastValueHold).unwrap();
        let next = frame.last_timestamp().unwrap() + Duration::hours(1);
        let at = series.append(next).unwrap();

        assert_eq!(at, 4);
        assert_eq!(series.n_appended(), 1);
        let view = series.view();
        assert_eq!(view.exogenous[0][4], 13.0);
        assert!(view.target[4].is_nan());
        assert!(view.difference[4].is_nan());
    }

    #[test]
    fn test_set_target_extends_difference() {
        let (frame, builder) = setup();
        let mut series = WorkingSeries::from_frame(&frame, &builder, ExogenousPolicy::LastValueHold).unwrap();
        let at = series.append(frame.last_timestamp().unwrap() + Duration::hours(1)).unwrap();
        series.set_target(at, 9.5).unwrap();

        assert_eq!(series.target()[at], 9.5);
        assert_eq!(series.view().difference[at], 2.5);
        // written once only
        assert!(series.set_target(at, 1.0).is_err());
    }

    #[test]
    fn test_observed_rows_are_read_only() {
        let (frame, builder) = setup();
        let mut series = WorkingSeries::from_frame(&frame, &builder, ExogenousPolicy::LastValueHold).unwrap();
        assert!(series.set_target(2, 0.0).is_err());
        assert!(series.append(frame.last_timestamp().unwrap()).is_err());
        assert_eq!(series.target(), frame.channel("y").unwrap());
    }
}
