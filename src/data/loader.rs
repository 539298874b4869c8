//! CSV loading into a [`TimeSeriesFrame`]

use super::frame::{Channel, TimeSeriesFrame};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Parse a timestamp cell. Offsets in RFC 3339 input are normalised to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim().trim_start_matches('\u{feff}');
    if raw.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Loads a timestamp column plus every numeric channel from a table.
#[derive(Debug, Clone)]
pub struct TimeSeriesLoader {
    timestamp_column: String,
    infer_schema_length: Option<usize>,
}

impl Default for TimeSeriesLoader {
    fn default() -> Self {
        Self::new("Timestamp")
    }
}

impl TimeSeriesLoader {
    pub fn new(timestamp_column: impl Into<String>) -> Self {
        Self {
            timestamp_column: timestamp_column.into(),
            infer_schema_length: Some(1000),
        }
    }

    /// Rows used by polars for schema inference (None = whole file)
    pub fn with_infer_schema_length(mut self, n: Option<usize>) -> Self {
        self.infer_schema_length = n;
        self
    }

    /// Load a CSV file. Every column named in `required` must be present.
    pub fn load_csv(&self, path: &Path, required: &[&str]) -> Result<TimeSeriesFrame> {
        if !path.is_file() {
            return Err(ForecastError::DataError(format!(
                "input file not found: {}",
                path.display()
            )));
        }

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        info!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            "Loaded input table"
        );

        self.from_dataframe(&df, required)
    }

    /// Convert an in-memory table into a frame sorted by timestamp.
    pub fn from_dataframe(&self, df: &DataFrame, required: &[&str]) -> Result<TimeSeriesFrame> {
        if df.get_column_index(&self.timestamp_column).is_none() {
            return Err(ForecastError::ColumnNotFound(self.timestamp_column.clone()));
        }
        for name in required {
            if df.get_column_index(name).is_none() {
                return Err(ForecastError::ColumnNotFound(name.to_string()));
            }
        }

        let timestamps = self.read_timestamps(df.column(&self.timestamp_column)?)?;

        let mut channels = Vec::new();
        for series in df.get_columns() {
            let name = series.name().to_string();
            if name == self.timestamp_column {
                continue;
            }
            let is_required = required.iter().any(|r| *r == name);
            if !series.dtype().is_numeric() && !is_required {
                debug!(column = %name, dtype = ?series.dtype(), "Skipping non-numeric column");
                continue;
            }
            let values = series
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            channels.push(Channel::new(name, values));
        }

        TimeSeriesFrame::from_unordered(timestamps, channels)
    }

    fn read_timestamps(&self, series: &Series) -> Result<Vec<NaiveDateTime>> {
        let as_text = match series.dtype() {
            DataType::String => series.clone(),
            _ => series.cast(&DataType::String)?,
        };

        as_text
            .str()?
            .into_iter()
            .enumerate()
            .map(|(row, cell)| {
                let cell = cell.ok_or_else(|| {
                    ForecastError::DataError(format!(
                        "missing value in '{}' at row {}",
                        self.timestamp_column, row
                    ))
                })?;
                parse_timestamp(cell).ok_or_else(|| {
                    ForecastError::DataError(format!(
                        "unparsable timestamp '{}' in '{}' at row {}",
                        cell, self.timestamp_column, row
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-01 12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 12:30"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T13:30:00+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 12:30:00.000"), Some(expected));
        assert!(parse_timestamp("not a time").is_none());
    }

    #[test]
    fn test_load_csv_sorts_and_casts() {
        let file = write_csv(
            "Timestamp,Chlorophyll_Kalman,Chlorophyll,Temperature_Kalman\n\
             2024-03-01 00:20:00,3.0,3.1,20.0\n\
             2024-03-01 00:00:00,1.0,1.1,\n\
             2024-03-01 00:10:00,2.0,2.2,19.0\n",
        );
        let loader = TimeSeriesLoader::default();
        let frame = loader
            .load_csv(file.path(), &["Chlorophyll_Kalman", "Chlorophyll"])
            .unwrap();

        assert_eq!(frame.len(), 3);
        assert_eq!(frame.channel("Chlorophyll_Kalman").unwrap(), &[1.0, 2.0, 3.0]);
        let temp = frame.channel("Temperature_Kalman").unwrap();
        assert!(temp[0].is_nan());
        assert_eq!(temp[1], 19.0);
    }

    #[test]
    fn test_load_csv_missing_target_is_fatal() {
        let file = write_csv("Timestamp,Chlorophyll\n2024-03-01 00:00:00,1.0\n");
        let loader = TimeSeriesLoader::default();
        let result = loader.load_csv(file.path(), &["Chlorophyll_Kalman", "Chlorophyll"]);
        assert!(matches!(result, Err(ForecastError::ColumnNotFound(ref c)) if c == "Chlorophyll_Kalman"));
    }

    #[test]
    fn test_load_csv_missing_file() {
        let loader = TimeSeriesLoader::default();
        let result = loader.load_csv(Path::new("/nonexistent/input.csv"), &[]);
        assert!(matches!(result, Err(ForecastError::DataError(_))));
    }
}
