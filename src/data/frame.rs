//! Timestamp-indexed multivariate frame

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;

/// A named numeric channel. Undefined readings are stored as NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub name: String,
    pub values: Vec<f64>,
}

impl Channel {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Ordered rows indexed by strictly increasing timestamps.
///
/// The frame is immutable once built; consumers borrow channels as slices.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesFrame {
    timestamps: Vec<NaiveDateTime>,
    channels: Vec<Channel>,
}

impl TimeSeriesFrame {
    /// Build a frame from rows that are already in time order.
    ///
    /// Fails if any channel length differs from the timestamp count or if the
    /// timestamps are not strictly increasing.
    pub fn new(timestamps: Vec<NaiveDateTime>, channels: Vec<Channel>) -> Result<Self> {
        for channel in &channels {
            if channel.values.len() != timestamps.len() {
                return Err(ForecastError::ShapeError {
                    expected: format!("{} values in channel '{}'", timestamps.len(), channel.name),
                    actual: channel.values.len().to_string(),
                });
            }
        }

        if let Some(pos) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(ForecastError::DataError(format!(
                "timestamps must be strictly increasing: {} is followed by {}",
                timestamps[pos],
                timestamps[pos + 1]
            )));
        }

        Ok(Self { timestamps, channels })
    }

    /// Build a frame from rows in arbitrary order, sorting them by timestamp.
    ///
    /// Duplicate timestamps are rejected.
    pub fn from_unordered(timestamps: Vec<NaiveDateTime>, channels: Vec<Channel>) -> Result<Self> {
        let mut order: Vec<usize> = (0..timestamps.len()).collect();
        order.sort_by_key(|&i| timestamps[i]);

        if let Some(w) = order.windows(2).find(|w| timestamps[w[0]] == timestamps[w[1]]) {
            return Err(ForecastError::DataError(format!(
                "duplicate timestamp {}",
                timestamps[w[0]]
            )));
        }

        let sorted_ts: Vec<NaiveDateTime> = order.iter().map(|&i| timestamps[i]).collect();
        let mut sorted_channels = Vec::with_capacity(channels.len());
        for channel in channels {
            if channel.values.len() != order.len() {
                return Err(ForecastError::ShapeError {
                    expected: format!("{} values in channel '{}'", order.len(), channel.name),
                    actual: channel.values.len().to_string(),
                });
            }
            let values = order.iter().map(|&i| channel.values[i]).collect();
            sorted_channels.push(Channel::new(channel.name, values));
        }

        Self::new(sorted_ts, sorted_channels)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.iter().any(|c| c.name == name)
    }

    /// Borrow a channel's values by name
    pub fn channel(&self, name: &str) -> Option<&[f64]> {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Borrow a channel's values, failing with `ColumnNotFound` if absent
    pub fn require_channel(&self, name: &str) -> Result<&[f64]> {
        self.channel(name)
            .ok_or_else(|| ForecastError::ColumnNotFound(name.to_string()))
    }

    /// Sampling interval of this frame (mode of consecutive differences)
    pub fn sampling_interval(&self) -> Result<Duration> {
        infer_sampling_interval(&self.timestamps)
    }
}

/// Infer the sampling interval as the statistical mode of consecutive
/// timestamp differences. Ties resolve to the smallest difference.
pub fn infer_sampling_interval(timestamps: &[NaiveDateTime]) -> Result<Duration> {
    if timestamps.len() < 2 {
        return Err(ForecastError::InsufficientData(format!(
            "at least 2 timestamps are needed to infer a sampling interval, got {}",
            timestamps.len()
        )));
    }

    let mut counts: BTreeMap<Duration, usize> = BTreeMap::new();
    for w in timestamps.windows(2) {
        *counts.entry(w[1] - w[0]).or_insert(0) += 1;
    }

    let mut best: Option<(Duration, usize)> = None;
    for (delta, count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((delta, count)),
        }
    }

    match best {
        Some((delta, _)) if delta > Duration::zero() => Ok(delta),
        _ => Err(ForecastError::DataError(
            "could not infer a positive sampling interval".to_string(),
        )),
    }
}

/// Number of steps needed to cover `horizon` at `interval`, rounded up.
pub fn horizon_steps(horizon: Duration, interval: Duration) -> Result<usize> {
    let interval_ms = interval.num_milliseconds();
    let horizon_ms = horizon.num_milliseconds();
    if interval_ms <= 0 {
        return Err(ForecastError::InvalidParameter {
            name: "interval".into(),
            value: interval.to_string(),
            reason: "must be at least one millisecond".into(),
        });
    }
    if horizon_ms <= 0 {
        return Err(ForecastError::InvalidParameter {
            name: "horizon".into(),
            value: horizon.to_string(),
            reason: "must be positive".into(),
        });
    }
    let steps = (horizon_ms + interval_ms - 1) / interval_ms;
    Ok(steps as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_new_rejects_non_increasing() {
        let result = TimeSeriesFrame::new(
            vec![ts(0, 0), ts(0, 10), ts(0, 10)],
            vec![Channel::new("a", vec![1.0, 2.0, 3.0])],
        );
        assert!(matches!(result, Err(ForecastError::DataError(_))));
    }

    #[test]
    fn test_new_rejects_length_mismatch() {
        let result = TimeSeriesFrame::new(
            vec![ts(0, 0), ts(0, 10)],
            vec![Channel::new("a", vec![1.0])],
        );
        assert!(matches!(result, Err(ForecastError::ShapeError { .. })));
    }

    #[test]
    fn test_from_unordered_sorts_rows() {
        let frame = TimeSeriesFrame::from_unordered(
            vec![ts(0, 20), ts(0, 0), ts(0, 10)],
            vec![Channel::new("a", vec![3.0, 1.0, 2.0])],
        )
        .unwrap();
        assert_eq!(frame.timestamps(), &[ts(0, 0), ts(0, 10), ts(0, 20)]);
        assert_eq!(frame.channel("a").unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_from_unordered_rejects_duplicates() {
        let result = TimeSeriesFrame::from_unordered(
            vec![ts(0, 10), ts(0, 0), ts(0, 10)],
            vec![Channel::new("a", vec![1.0, 2.0, 3.0])],
        );
        assert!(matches!(result, Err(ForecastError::DataError(_))));
    }

    #[test]
    fn test_require_channel_missing() {
        let frame = TimeSeriesFrame::new(vec![ts(0, 0)], vec![]).unwrap();
        assert!(matches!(
            frame.require_channel("target"),
            Err(ForecastError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_sampling_interval_mode() {
        // gaps are tolerated: 10-minute spacing dominates
        let stamps = vec![ts(0, 0), ts(0, 10), ts(0, 20), ts(1, 0), ts(1, 10), ts(1, 20)];
        assert_eq!(infer_sampling_interval(&stamps).unwrap(), Duration::minutes(10));
    }

    #[test]
    fn test_sampling_interval_tie_prefers_smallest() {
        let stamps = vec![ts(0, 0), ts(0, 10), ts(0, 30)];
        assert_eq!(infer_sampling_interval(&stamps).unwrap(), Duration::minutes(10));
    }

    #[test]
    fn test_sampling_interval_needs_two_rows() {
        assert!(matches!(
            infer_sampling_interval(&[ts(0, 0)]),
            Err(ForecastError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_horizon_steps_rounds_up() {
        assert_eq!(horizon_steps(Duration::days(7), Duration::minutes(10)).unwrap(), 1008);
        assert_eq!(horizon_steps(Duration::minutes(25), Duration::minutes(10)).unwrap(), 3);
        assert!(horizon_steps(Duration::zero(), Duration::minutes(10)).is_err());
    }
}
