//! Forecast artifact writer
//!
//! The CSV produced here is the only contract with the dashboards: a timestamp
//! column and a single `Forecast_<target>` value column.

use crate::error::{ForecastError, Result};
use crate::forecast::Forecast;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct ForecastWriter {
    timestamp_column: String,
    value_column: String,
}

impl ForecastWriter {
    /// Writer for forecasts of `target`; the value column is `Forecast_<target>`
    pub fn new(target: &str) -> Self {
        Self {
            timestamp_column: "Timestamp".to_string(),
            value_column: format!("Forecast_{}", target),
        }
    }

    pub fn with_timestamp_column(mut self, name: impl Into<String>) -> Self {
        self.timestamp_column = name.into();
        self
    }

    pub fn value_column(&self) -> &str {
        &self.value_column
    }

    pub fn to_dataframe(&self, forecast: &Forecast) -> Result<DataFrame> {
        let stamps: Vec<String> = forecast
            .points()
            .iter()
            .map(|p| p.timestamp.format(TIMESTAMP_FORMAT).to_string())
            .collect();
        let values: Vec<f64> = forecast.points().iter().map(|p| p.value).collect();

        let df = DataFrame::new(vec![
            Series::new(self.timestamp_column.as_str().into(), stamps),
            Series::new(self.value_column.as_str().into(), values),
        ])?;
        Ok(df)
    }

    /// Write the forecast to `path`.
    ///
    /// The table is first written next to the destination and then renamed, so
    /// an interrupted write never leaves a truncated artifact behind.
    pub fn write_csv(&self, forecast: &Forecast, path: &Path) -> Result<()> {
        if forecast.is_empty() {
            return Err(ForecastError::InferenceError(
                "refusing to write an empty forecast".to_string(),
            ));
        }

        let mut df = self.to_dataframe(forecast)?;
        let staging = staging_path(path);
        let written = write_staged(&mut df, &staging)
            .and_then(|_| std::fs::rename(&staging, path).map_err(ForecastError::from));
        if let Err(e) = written {
            // a failed write leaves neither the staging file nor a new artifact
            let _ = std::fs::remove_file(&staging);
            return Err(e);
        }

        info!(path = %path.display(), rows = df.height(), "Forecast written");
        Ok(())
    }
}

fn write_staged(df: &mut DataFrame, staging: &Path) -> Result<()> {
    let mut file = File::create(staging)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .include_bom(true)
        .finish(df)?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::ForecastPoint;
    use chrono::{Duration, NaiveDate};

    fn sample_forecast() -> Forecast {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Forecast::new(
            (0..3)
                .map(|i| ForecastPoint {
                    timestamp: start + Duration::minutes(10 * i),
                    value: 1.5 + i as f64,
                })
                .collect(),
        )
    }

    #[test]
    fn test_write_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future_week_forecast.csv");

        let writer = ForecastWriter::new("Chlorophyll_Kalman");
        writer.write_csv(&sample_forecast(), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(&[0xEF, 0xBB, 0xBF]));

        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Timestamp,Forecast_Chlorophyll_Kalman");
        assert!(lines[1].starts_with("2024-06-01 00:00:00,1.5"));
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn test_write_csv_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let writer = ForecastWriter::new("target");
        assert!(writer.write_csv(&Forecast::new(Vec::new()), &path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_write_removes_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        // a directory in the way makes the final rename fail
        let path = dir.path().join("occupied");
        std::fs::create_dir(&path).unwrap();

        let writer = ForecastWriter::new("target");
        assert!(writer.write_csv(&sample_forecast(), &path).is_err());
        assert!(!staging_path(&path).exists());
        assert!(path.is_dir());
    }
}
