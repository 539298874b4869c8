//! Leakage-safe feature engineering
//!
//! Every feature for row `t` is derived from rows strictly before `t` (via
//! [`shifted_window`](super::window::shifted_window)) plus the calendar
//! attributes of `t` itself.

use super::window::{first_difference, lagged, shifted_stat, Shift, WindowStat};
use crate::data::TimeSeriesFrame;
use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};
use ndarray::{s, Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{debug, warn};

/// Lag offsets and rolling windows, in sample steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Target lags
    pub target_lags: Vec<usize>,
    /// Target rolling mean/std windows
    pub target_windows: Vec<usize>,
    /// Lags of the first difference
    pub diff_lags: Vec<usize>,
    /// Rolling mean/std windows of the first difference
    pub diff_windows: Vec<usize>,
    /// Exogenous lags (short / medium / long)
    pub exogenous_lags: Vec<usize>,
    /// Exogenous rolling mean windows (medium / long)
    pub exogenous_windows: Vec<usize>,
    /// Include hour-of-day and day-of-week
    pub calendar: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        // 10-minute sampling: 6 = 1 hour, 72 = 12 hours, 144 = 1 day
        Self {
            target_lags: vec![2],
            target_windows: vec![6, 72, 144],
            diff_lags: vec![1, 2],
            diff_windows: vec![6, 72],
            exogenous_lags: vec![6, 72, 144],
            exogenous_windows: vec![72, 144],
            calendar: true,
        }
    }
}

impl FeatureConfig {
    pub fn with_target_lags(mut self, lags: Vec<usize>) -> Self {
        self.target_lags = lags;
        self
    }

    pub fn with_target_windows(mut self, windows: Vec<usize>) -> Self {
        self.target_windows = windows;
        self
    }

    pub fn with_diff(mut self, lags: Vec<usize>, windows: Vec<usize>) -> Self {
        self.diff_lags = lags;
        self.diff_windows = windows;
        self
    }

    pub fn with_exogenous(mut self, lags: Vec<usize>, windows: Vec<usize>) -> Self {
        self.exogenous_lags = lags;
        self.exogenous_windows = windows;
        self
    }

    pub fn with_calendar(mut self, calendar: bool) -> Self {
        self.calendar = calendar;
        self
    }

    /// Reject offsets that would read the current row and windows whose
    /// standard deviation can never be defined.
    pub fn validate(&self) -> Result<()> {
        let lag_sets = [
            ("target_lags", &self.target_lags),
            ("diff_lags", &self.diff_lags),
            ("exogenous_lags", &self.exogenous_lags),
            ("exogenous_windows", &self.exogenous_windows),
        ];
        for (name, values) in lag_sets {
            if let Some(bad) = values.iter().find(|&&v| v == 0) {
                return Err(ForecastError::InvalidParameter {
                    name: name.into(),
                    value: bad.to_string(),
                    reason: "must be at least 1".into(),
                });
            }
        }
        for (name, values) in [
            ("target_windows", &self.target_windows),
            ("diff_windows", &self.diff_windows),
        ] {
            if let Some(bad) = values.iter().find(|&&v| v < 2) {
                return Err(ForecastError::InvalidParameter {
                    name: name.into(),
                    value: bad.to_string(),
                    reason: "rolling std needs a window of at least 2".into(),
                });
            }
        }
        Ok(())
    }

    /// Rows of history needed before the first fully defined feature vector
    pub fn warmup_rows(&self) -> usize {
        let target = self
            .target_lags
            .iter()
            .chain(self.target_windows.iter())
            .copied()
            .max()
            .unwrap_or(0);
        // the difference series starts one row later than the target
        let diff = self
            .diff_lags
            .iter()
            .chain(self.diff_windows.iter())
            .map(|v| v + 1)
            .max()
            .unwrap_or(0);
        let exog = self
            .exogenous_lags
            .iter()
            .chain(self.exogenous_windows.iter())
            .copied()
            .max()
            .unwrap_or(0);
        target.max(diff).max(exog)
    }
}

/// Column-oriented borrowed view of the channels a [`FeatureBuilder`] reads.
///
/// `difference` must be the first difference of `target`.
#[derive(Debug, Clone)]
pub struct SeriesView<'a> {
    pub timestamps: &'a [NaiveDateTime],
    pub target: &'a [f64],
    pub difference: &'a [f64],
    pub exogenous: Vec<&'a [f64]>,
}

impl SeriesView<'_> {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Supervised learning table: one feature vector per valid timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    feature_names: Vec<String>,
    timestamps: Vec<NaiveDateTime>,
    x: Array2<f64>,
    y: Array1<f64>,
}

impl FeatureMatrix {
    pub fn new(
        feature_names: Vec<String>,
        timestamps: Vec<NaiveDateTime>,
        x: Array2<f64>,
        y: Array1<f64>,
    ) -> Result<Self> {
        if x.nrows() != timestamps.len() || y.len() != timestamps.len() {
            return Err(ForecastError::ShapeError {
                expected: format!("{} rows", timestamps.len()),
                actual: format!("x: {}, y: {}", x.nrows(), y.len()),
            });
        }
        if x.ncols() != feature_names.len() {
            return Err(ForecastError::ShapeError {
                expected: format!("{} feature columns", feature_names.len()),
                actual: x.ncols().to_string(),
            });
        }
        Ok(Self {
            feature_names,
            timestamps,
            x,
            y,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn x(&self) -> &Array2<f64> {
        &self.x
    }

    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied()
    }

    /// Contiguous block of rows, preserving time order
    pub fn rows(&self, range: Range<usize>) -> FeatureMatrix {
        FeatureMatrix {
            feature_names: self.feature_names.clone(),
            timestamps: self.timestamps[range.clone()].to_vec(),
            x: self.x.slice(s![range.clone(), ..]).to_owned(),
            y: self.y.slice(s![range]).to_owned(),
        }
    }

    /// Value of the named feature at row `i`
    pub fn feature(&self, name: &str, i: usize) -> Option<f64> {
        let col = self.feature_names.iter().position(|n| n == name)?;
        self.x.get([i, col]).copied()
    }
}

/// Derives a [`FeatureMatrix`] from a frame and recomputes single rows for the
/// recursive forecaster.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    config: FeatureConfig,
    target: String,
    exogenous: Vec<String>,
    target_lags: Vec<Shift>,
    diff_lags: Vec<Shift>,
    exogenous_lags: Vec<Shift>,
    feature_names: Vec<String>,
}

impl FeatureBuilder {
    /// Create a builder for a fixed channel layout.
    pub fn new(config: FeatureConfig, target: impl Into<String>, exogenous: Vec<String>) -> Result<Self> {
        config.validate()?;
        let target = target.into();
        if target.is_empty() {
            return Err(ForecastError::ConfigError("target channel name is empty".into()));
        }

        let to_shifts = |lags: &[usize]| -> Result<Vec<Shift>> {
            lags.iter().map(|&l| Shift::new(l)).collect()
        };
        let target_lags = to_shifts(&config.target_lags)?;
        let diff_lags = to_shifts(&config.diff_lags)?;
        let exogenous_lags = to_shifts(&config.exogenous_lags)?;
        let feature_names = Self::names(&config, &target, &exogenous);

        Ok(Self {
            config,
            target,
            exogenous,
            target_lags,
            diff_lags,
            exogenous_lags,
            feature_names,
        })
    }

    /// Create a builder bound to the channels actually present in `frame`.
    ///
    /// The target channel is mandatory. Requested exogenous channels that the
    /// frame does not carry are skipped with a warning.
    pub fn for_frame(
        config: FeatureConfig,
        target: &str,
        exogenous: &[String],
        frame: &TimeSeriesFrame,
    ) -> Result<Self> {
        frame.require_channel(target)?;
        let mut present = Vec::with_capacity(exogenous.len());
        for name in exogenous {
            if name == target {
                warn!(channel = %name, "Exogenous channel equals the target, skipping");
            } else if frame.has_channel(name) {
                present.push(name.clone());
            } else {
                warn!(channel = %name, "Exogenous channel not found in input, skipping");
            }
        }
        Self::new(config, target, present)
    }

    fn names(config: &FeatureConfig, target: &str, exogenous: &[String]) -> Vec<String> {
        let mut names = Vec::new();
        for lag in &config.target_lags {
            names.push(format!("{}_lag{}", target, lag));
        }
        for win in &config.target_windows {
            names.push(format!("{}_roll_mean_{}", target, win));
            names.push(format!("{}_roll_std_{}", target, win));
        }
        let diff = format!("{}_diff", target);
        for lag in &config.diff_lags {
            names.push(format!("{}_lag{}", diff, lag));
        }
        for win in &config.diff_windows {
            names.push(format!("{}_roll_mean_{}", diff, win));
            names.push(format!("{}_roll_std_{}", diff, win));
        }
        for col in exogenous {
            for lag in &config.exogenous_lags {
                names.push(format!("{}_lag{}", col, lag));
            }
            for win in &config.exogenous_windows {
                names.push(format!("{}_roll_mean_{}", col, win));
            }
        }
        if config.calendar {
            names.push("hour".to_string());
            names.push("dayofweek".to_string());
        }
        names
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn exogenous(&self) -> &[String] {
        &self.exogenous
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Feature vector for row `at` of `view`. Undefined entries are NaN.
    pub fn row_features(&self, view: &SeriesView<'_>, at: usize) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.feature_names.len());

        for &shift in &self.target_lags {
            row.push(lagged(view.target, at, shift));
        }
        for &win in &self.config.target_windows {
            row.push(shifted_stat(view.target, at, win, WindowStat::Mean));
            row.push(shifted_stat(view.target, at, win, WindowStat::Std));
        }

        for &shift in &self.diff_lags {
            row.push(lagged(view.difference, at, shift));
        }
        for &win in &self.config.diff_windows {
            row.push(shifted_stat(view.difference, at, win, WindowStat::Mean));
            row.push(shifted_stat(view.difference, at, win, WindowStat::Std));
        }

        for channel in &view.exogenous {
            for &shift in &self.exogenous_lags {
                row.push(lagged(channel, at, shift));
            }
            for &win in &self.config.exogenous_windows {
                row.push(shifted_stat(channel, at, win, WindowStat::Mean));
            }
        }

        if self.config.calendar {
            let ts = view.timestamps[at];
            row.push(ts.hour() as f64);
            row.push(ts.weekday().num_days_from_monday() as f64);
        }

        row
    }

    /// Build the feature matrix, keeping only rows where every feature and the
    /// target are defined.
    pub fn build(&self, frame: &TimeSeriesFrame) -> Result<FeatureMatrix> {
        let target = frame.require_channel(&self.target)?;
        let difference = first_difference(target);
        let exogenous = self
            .exogenous
            .iter()
            .map(|name| frame.require_channel(name))
            .collect::<Result<Vec<_>>>()?;

        let view = SeriesView {
            timestamps: frame.timestamps(),
            target,
            difference: &difference,
            exogenous,
        };

        let valid: Vec<(usize, Vec<f64>)> = (0..view.len())
            .into_par_iter()
            .filter_map(|i| {
                if !view.target[i].is_finite() {
                    return None;
                }
                let row = self.row_features(&view, i);
                row.iter().all(|v| v.is_finite()).then_some((i, row))
            })
            .collect();

        let n_features = self.n_features();
        let mut x = Array2::zeros((valid.len(), n_features));
        let mut y = Array1::zeros(valid.len());
        let mut timestamps = Vec::with_capacity(valid.len());
        for (r, (i, row)) in valid.iter().enumerate() {
            x.row_mut(r).assign(&ndarray::ArrayView1::from(row.as_slice()));
            y[r] = view.target[*i];
            timestamps.push(view.timestamps[*i]);
        }

        debug!(
            rows = frame.len(),
            valid_rows = valid.len(),
            features = n_features,
            "Built feature matrix"
        );

        FeatureMatrix::new(self.feature_names.clone(), timestamps, x, y)
    }
}
