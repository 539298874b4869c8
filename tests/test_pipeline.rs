//! Integration test: CSV in → search → final fit → forecast CSV out

use chlorocast::optimizer::Study;
use chlorocast::pipeline::{ForecastPipeline, PipelineConfig, PipelineReport};
use chlorocast::timeseries::FeatureConfig;
use chlorocast::ForecastError;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

/// Hourly sensor export: daily chlorophyll cycle driven by radiation and temperature
fn write_sensor_csv(path: &Path, n_rows: usize, include_target: bool) {
    let mut csv = String::new();
    let target_cols = if include_target { "Chlorophyll_Kalman,Chlorophyll," } else { "" };
    writeln!(csv, "Timestamp,{}Temperature_Kalman,W_Shortwave Radiation,Site", target_cols).unwrap();

    for i in 0..n_rows {
        let ts = start() + Duration::hours(i as i64);
        let phase = i as f64 * std::f64::consts::TAU / 24.0;
        let radiation = (phase.sin() * 400.0).max(0.0);
        let temperature = 18.0 + 3.0 * (phase - 1.0).sin();
        let chl = 5.0 + 2.0 * (phase - 0.5).sin() + 0.002 * i as f64;
        // raw reading carries deterministic "noise"
        let raw = chl + 0.3 * ((i * 7919) % 13) as f64 / 13.0 - 0.15;

        let _ = write!(csv, "{}", ts.format("%Y-%m-%d %H:%M:%S"));
        if include_target {
            let _ = write!(csv, ",{:.6},{:.6}", chl, raw);
        }
        let _ = writeln!(csv, ",{:.6},{:.6},buoy-1", temperature, radiation);
    }
    std::fs::write(path, csv).unwrap();
}

fn small_config(input: &Path, output: &Path) -> PipelineConfig {
    let features = FeatureConfig::default()
        .with_target_lags(vec![1, 2])
        .with_target_windows(vec![3, 12])
        .with_diff(vec![1], vec![6])
        .with_exogenous(vec![1, 6], vec![12]);

    PipelineConfig::new()
        .with_input(input)
        .with_output(output)
        .with_exogenous(vec![
            "Temperature_Kalman".into(),
            "W_Shortwave Radiation".into(),
            "pH_Kalman".into(),
        ])
        .with_features(features)
        .with_holdout_days(3.0)
        .with_cv_folds(3)
        .with_n_trials(4)
        .with_n_estimators(40)
        .with_early_stopping_rounds(5)
        .with_horizon_days(1.0)
}

fn read_output(path: &PathBuf) -> String {
    let bytes = std::fs::read(path).unwrap();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn test_end_to_end_forecast() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sensors.csv");
    let output = dir.path().join("future_week_forecast.csv");
    write_sensor_csv(&input, 24 * 30, true);

    let pipeline = ForecastPipeline::new(small_config(&input, &output)).unwrap();
    let result = pipeline.run().unwrap();

    // 1 day at 1 hour
    assert_eq!(result.forecast.len(), 24);
    assert_eq!(result.report.horizon_steps, 24);
    assert_eq!(result.report.interval_secs, 3600);

    let last = start() + Duration::hours(24 * 30 - 1);
    let points = result.forecast.points();
    assert_eq!(points[0].timestamp, last + Duration::hours(1));
    for pair in points.windows(2) {
        assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::hours(1));
    }
    assert!(result.forecast.values().iter().all(|v| v.is_finite()));

    // absent exogenous channel is skipped, not fatal
    assert!(!result.report.feature_names.iter().any(|f| f.contains("pH_Kalman")));

    let text = read_output(&output);
    assert!(text.starts_with('\u{feff}'));
    let mut lines = text.trim_start_matches('\u{feff}').lines();
    assert_eq!(lines.next().unwrap(), "Timestamp,Forecast_Chlorophyll_Kalman");
    assert_eq!(lines.count(), 24);
}

#[test]
fn test_report_and_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sensors.csv");
    let output = dir.path().join("forecast.csv");
    let report_path = dir.path().join("report.json");
    let study_path = dir.path().join("study.json");
    write_sensor_csv(&input, 24 * 30, true);

    let config = small_config(&input, &output)
        .with_report(&report_path)
        .with_study(&study_path);
    let result = ForecastPipeline::new(config).unwrap().run().unwrap();
    let report = &result.report;

    assert_eq!(report.completed_trials + report.failed_trials, 4);
    assert!(report.best_cv_mae.is_finite());
    assert!(report.test_rows > 0);
    // leading rows without a full lag/window history are dropped
    assert!(report.train_rows + report.test_rows < report.rows);

    let holdout = report.holdout.as_ref().unwrap();
    assert!(holdout.mae >= 0.0 && holdout.rmse >= holdout.mae);
    assert!(holdout.mape.is_some());
    assert!(report.sensor_mape.unwrap() > 0.0);
    assert!(!report.top_features.is_empty() && report.top_features.len() <= 10);

    let saved: PipelineReport = serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(saved.best_params.keys().collect::<Vec<_>>(), report.best_params.keys().collect::<Vec<_>>());
    assert_eq!(saved.horizon_steps, 24);
    let study = Study::load(&study_path).unwrap();
    assert_eq!(study.trials.len(), 4);
}

#[test]
fn test_seeded_runs_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sensors.csv");
    write_sensor_csv(&input, 24 * 25, true);

    let run = |name: &str| {
        let output = dir.path().join(name);
        ForecastPipeline::new(small_config(&input, &output).with_seed(7))
            .unwrap()
            .run()
            .unwrap()
    };
    let a = run("a.csv");
    let b = run("b.csv");

    assert_eq!(a.report.best_params, b.report.best_params);
    assert_eq!(a.forecast, b.forecast);
    assert_eq!(read_output(&dir.path().join("a.csv")), read_output(&dir.path().join("b.csv")));
}

#[test]
fn test_missing_target_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sensors.csv");
    let output = dir.path().join("forecast.csv");
    write_sensor_csv(&input, 24 * 10, false);

    let result = ForecastPipeline::new(small_config(&input, &output)).unwrap().run();
    assert!(matches!(result, Err(ForecastError::ColumnNotFound(ref c)) if c == "Chlorophyll_Kalman"));
    assert!(!output.exists());
}

#[test]
fn test_missing_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("forecast.csv");
    let config = small_config(&dir.path().join("absent.csv"), &output);
    assert!(ForecastPipeline::new(config).unwrap().run().is_err());
    assert!(!output.exists());
}

#[test]
fn test_too_short_history() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sensors.csv");
    let output = dir.path().join("forecast.csv");
    // fewer rows than the longest window needs
    write_sensor_csv(&input, 10, true);

    let result = ForecastPipeline::new(small_config(&input, &output)).unwrap().run();
    match result {
        Err(ForecastError::InsufficientData(msg)) => assert!(msg.contains("needed"), "{}", msg),
        other => panic!("expected InsufficientData, got {:?}", other.map(|o| o.report.rows)),
    }
    assert!(!output.exists());
}

#[test]
fn test_holdout_beyond_calendar_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sensors.csv");
    let output = dir.path().join("forecast.csv");
    write_sensor_csv(&input, 24 * 10, true);

    let config = small_config(&input, &output).with_holdout_days(1e9);
    let result = ForecastPipeline::new(config).unwrap().run();
    assert!(matches!(result, Err(ForecastError::InsufficientData(_))));
    assert!(!output.exists());
}

#[test]
fn test_failed_study_save_writes_no_forecast() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sensors.csv");
    let output = dir.path().join("forecast.csv");
    write_sensor_csv(&input, 24 * 20, true);

    let config = small_config(&input, &output).with_study(dir.path().join("missing").join("study.json"));
    assert!(ForecastPipeline::new(config).unwrap().run().is_err());
    assert!(!output.exists());
}

#[test]
fn test_inspect() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sensors.csv");
    write_sensor_csv(&input, 24 * 5, true);

    let pipeline = ForecastPipeline::new(small_config(&input, &dir.path().join("out.csv"))).unwrap();
    let info = pipeline.inspect().unwrap();
    assert_eq!(info.rows, 120);
    assert_eq!(info.interval_secs, 3600);
    assert_eq!(info.horizon_steps, 24);
    assert_eq!(info.exogenous, vec!["Temperature_Kalman", "W_Shortwave Radiation"]);
    assert!(info.valid_rows < info.rows);
}
