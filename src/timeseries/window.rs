//! Trailing windows that never include the current row
//!
//! Every lag and rolling statistic in the crate goes through
//! [`shifted_window`]. Its [`Shift`] argument cannot be zero, so a feature for
//! row `t` can only ever read rows `< t`.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Distance, in rows, between the current row and the newest value a window
/// may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shift(NonZeroUsize);

impl Shift {
    /// The minimum shift: the window ends at the previous row.
    pub const ONE: Shift = Shift(NonZeroUsize::MIN);

    pub fn new(rows: usize) -> Result<Self> {
        NonZeroUsize::new(rows)
            .map(Shift)
            .ok_or_else(|| ForecastError::InvalidParameter {
                name: "shift".into(),
                value: rows.to_string(),
                reason: "a feature may not read the row it describes".into(),
            })
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

/// Statistic computed over a trailing window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowStat {
    /// Arithmetic mean
    Mean,
    /// Sample standard deviation (n - 1 denominator)
    Std,
}

/// The `len` values ending `shift` rows before `at`, i.e. rows
/// `at - shift - len + 1 ..= at - shift`. `None` while the history is too short.
pub fn shifted_window(series: &[f64], at: usize, shift: Shift, len: usize) -> Option<&[f64]> {
    if len == 0 {
        return None;
    }
    let end = at.checked_sub(shift.get())? + 1;
    let start = end.checked_sub(len)?;
    series.get(start..end)
}

/// Value `shift` rows before `at`, NaN when unavailable.
pub fn lagged(series: &[f64], at: usize, shift: Shift) -> f64 {
    shifted_window(series, at, shift, 1)
        .map(|w| w[0])
        .unwrap_or(f64::NAN)
}

/// Rolling statistic over the `len` rows before `at`.
///
/// Undefined (NaN) unless the full window is available and every value in it
/// is finite.
pub fn shifted_stat(series: &[f64], at: usize, len: usize, stat: WindowStat) -> f64 {
    match shifted_window(series, at, Shift::ONE, len) {
        Some(window) if window.iter().all(|v| v.is_finite()) => match stat {
            WindowStat::Mean => mean(window),
            WindowStat::Std => sample_std(window),
        },
        _ => f64::NAN,
    }
}

/// First difference `d[t] = y[t] - y[t-1]`; undefined at the first row.
pub fn first_difference(series: &[f64]) -> Vec<f64> {
    let mut diff = Vec::with_capacity(series.len());
    if !series.is_empty() {
        diff.push(f64::NAN);
    }
    diff.extend(series.windows(2).map(|w| w[1] - w[0]));
    diff
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_rejects_zero() {
        assert!(Shift::new(0).is_err());
        assert_eq!(Shift::new(3).unwrap().get(), 3);
    }

    #[test]
    fn test_shifted_window_excludes_current_row() {
        let series = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(shifted_window(&series, 4, Shift::ONE, 3), Some(&[2.0, 3.0, 4.0][..]));
        assert_eq!(shifted_window(&series, 4, Shift::new(2).unwrap(), 2), Some(&[2.0, 3.0][..]));
        // not enough history yet
        assert_eq!(shifted_window(&series, 2, Shift::ONE, 3), None);
        assert_eq!(shifted_window(&series, 0, Shift::ONE, 1), None);
    }

    #[test]
    fn test_lagged() {
        let series = [10.0, 20.0, 30.0];
        assert_eq!(lagged(&series, 2, Shift::new(2).unwrap()), 10.0);
        assert!(lagged(&series, 1, Shift::new(2).unwrap()).is_nan());
    }

    #[test]
    fn test_shifted_stat() {
        let series = [1.0, 2.0, 3.0, 4.0, 100.0];
        // window for row 4 is [2, 3, 4]; the 100 at row 4 is never read
        assert!((shifted_stat(&series, 4, 3, WindowStat::Mean) - 3.0).abs() < 1e-12);
        assert!((shifted_stat(&series, 4, 3, WindowStat::Std) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_shifted_stat_nan_in_window() {
        let series = [1.0, f64::NAN, 3.0, 4.0];
        assert!(shifted_stat(&series, 3, 3, WindowStat::Mean).is_nan());
        assert!(!shifted_stat(&series, 4, 2, WindowStat::Mean).is_nan());
    }

    #[test]
    fn test_std_needs_two_values() {
        let series = [1.0, 2.0];
        assert!(shifted_stat(&series, 1, 1, WindowStat::Std).is_nan());
    }

    #[test]
    fn test_first_difference() {
        let diff = first_difference(&[1.0, 3.0, 6.0, 10.0]);
        assert!(diff[0].is_nan());
        assert_eq!(&diff[1..], &[2.0, 3.0, 4.0]);
        assert!(first_difference(&[]).is_empty());
    }
}
