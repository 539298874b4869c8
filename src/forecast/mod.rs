//! Multi-step forecasting
//!
//! [`RecursiveForecaster`] extends an owned, append-only copy of the series
//! one sampling interval at a time, feeding each prediction back in as the
//! target for the features of the following step.

mod recursive;
mod working;

pub use recursive::{ForecastRun, ForecastState, RecursiveForecaster};
pub use working::{ExogenousPolicy, WorkingSeries};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One predicted value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Ordered forecast sequence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    points: Vec<ForecastPoint>,
}

/// Headline numbers of a forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub steps: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub mean: f64,
    pub min: f64,
    pub peak: f64,
    pub peak_timestamp: NaiveDateTime,
}

impl Forecast {
    pub fn new(points: Vec<ForecastPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    /// `None` for an empty forecast
    pub fn summary(&self) -> Option<ForecastSummary> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        // first maximum wins
        let peak = self
            .points
            .iter()
            .fold(first, |best, p| if p.value > best.value { p } else { best });
        let min = self.points.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
        let mean = self.points.iter().map(|p| p.value).sum::<f64>() / self.points.len() as f64;

        Some(ForecastSummary {
            steps: self.points.len(),
            start: first.timestamp,
            end: last.timestamp,
            mean,
            min,
            peak: peak.value,
            peak_timestamp: peak.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    #[test]
    fn test_summary() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let forecast = Forecast::new(
            [2.0, 5.0, 1.0, 5.0]
                .iter()
                .enumerate()
                .map(|(i, &value)| ForecastPoint {
                    timestamp: start + Duration::minutes(10 * i as i64),
                    value,
                })
                .collect(),
        );
        let summary = forecast.summary().unwrap();
        assert_eq!(summary.steps, 4);
        assert_eq!(summary.peak, 5.0);
        assert_eq!(summary.peak_timestamp, start + Duration::minutes(10));
        assert_eq!(summary.min, 1.0);
        assert!((summary.mean - 3.25).abs() < 1e-12);
        assert_eq!(summary.end, start + Duration::minutes(30));
        assert!(Forecast::default().summary().is_none());
    }
}
