//! Chlorocast CLI Module
//!
//! Command-line interface for running the forecast pipeline and inspecting inputs.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::optimizer::SamplerType;
use crate::pipeline::{ForecastPipeline, PipelineConfig, PipelineReport};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn warn(s: &str) -> ColoredString   { s.truecolor(230, 180, 90) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn fmt_opt(value: Option<f64>, suffix: &str) -> String {
    match value {
        Some(v) => format!("{:.4}{}", v, suffix),
        None => "n/a".to_string(),
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "chlorocast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-day chlorophyll forecasting from water-quality sensor series")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search, fit and write a forecast
    Run(RunArgs),

    /// Show dataset information
    Info(InfoArgs),
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Input CSV file
    #[arg(short, long)]
    pub data: PathBuf,

    /// Pipeline configuration (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Filtered target column
    #[arg(short, long)]
    pub target: Option<String>,

    /// Raw target column
    #[arg(long)]
    pub raw_target: Option<String>,
}

impl InfoArgs {
    pub fn to_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        config.input = Some(self.data.clone());
        if let Some(target) = &self.target {
            config.target_column = target.clone();
        }
        if let Some(raw) = &self.raw_target {
            config.raw_target_column = raw.clone();
        }
        Ok(config)
    }
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Pipeline configuration (JSON); flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Input CSV file
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Forecast CSV file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Filtered target column
    #[arg(short, long)]
    pub target: Option<String>,

    /// Raw target column, used for the sensor noise diagnostic
    #[arg(long)]
    pub raw_target: Option<String>,

    /// Exogenous columns, comma separated
    #[arg(long, value_delimiter = ',')]
    pub exog: Option<Vec<String>>,

    /// Trailing holdout length in days
    #[arg(long)]
    pub holdout_days: Option<f64>,

    /// Expanding-window cross-validation folds
    #[arg(long)]
    pub cv_folds: Option<usize>,

    /// Number of search trials
    #[arg(short = 'n', long)]
    pub trials: Option<usize>,

    /// Sampler (tpe, random)
    #[arg(long)]
    pub sampler: Option<String>,

    /// Random seed
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Forecast horizon in days
    #[arg(long)]
    pub horizon_days: Option<f64>,

    /// Stop the search after this many trials without improvement
    #[arg(long)]
    pub trial_patience: Option<usize>,

    /// Boosting rounds without validation improvement before a CV fit stops
    #[arg(long)]
    pub early_stopping_rounds: Option<usize>,

    /// Trials evaluated in parallel
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Search time limit in seconds
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Write a JSON run report
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Write every search trial as JSON
    #[arg(long)]
    pub study: Option<PathBuf>,
}

fn parse_sampler(name: &str) -> anyhow::Result<SamplerType> {
    match name.to_lowercase().as_str() {
        "tpe" => Ok(SamplerType::TPE),
        "random" => Ok(SamplerType::Random),
        other => anyhow::bail!("unknown sampler '{}' (expected tpe or random)", other),
    }
}

impl RunArgs {
    /// Configuration file (or defaults) with the command-line flags applied on top
    pub fn to_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(data) = &self.data {
            config.input = Some(data.clone());
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(target) = &self.target {
            config.target_column = target.clone();
        }
        if let Some(raw) = &self.raw_target {
            config.raw_target_column = raw.clone();
        }
        if let Some(exog) = &self.exog {
            config.exogenous_columns = exog
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
        }
        if let Some(days) = self.holdout_days {
            config.holdout_days = days;
        }
        if let Some(folds) = self.cv_folds {
            config.cv_folds = folds;
        }
        if let Some(trials) = self.trials {
            config.n_trials = trials;
        }
        if let Some(sampler) = &self.sampler {
            config.sampler = parse_sampler(sampler)?;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(days) = self.horizon_days {
            config.horizon_days = days;
        }
        if self.trial_patience.is_some() {
            config.patience = self.trial_patience;
        }
        if let Some(rounds) = self.early_stopping_rounds {
            config.early_stopping_rounds = rounds;
        }
        if let Some(jobs) = self.jobs {
            config.n_jobs = jobs;
        }
        if self.timeout.is_some() {
            config.timeout_secs = self.timeout;
        }
        if let Some(report) = &self.report {
            config.report = Some(report.clone());
        }
        if let Some(study) = &self.study {
            config.study = Some(study.clone());
        }

        if config.input.is_none() {
            anyhow::bail!("no input file: pass --data or set \"input\" in the config file");
        }
        Ok(config)
    }
}

// ─── Run ───────────────────────────────────────────────────────────────────────

pub fn cmd_run(args: &RunArgs) -> anyhow::Result<()> {
    let config = args.to_config()?;
    let pipeline = ForecastPipeline::new(config)?;
    let config = pipeline.config();

    section("Forecast");
    if let Some(input) = &config.input {
        println!("  {:<12} {}", muted("Data"), input.display());
    }
    println!("  {:<12} {}", muted("Target"), config.target_column);
    println!("  {:<12} {} trials, {} folds", muted("Search"), config.n_trials, config.cv_folds);
    println!("  {:<12} {} days", muted("Horizon"), config.horizon_days);
    println!();

    let start = Instant::now();
    step_run("Loading data");
    let frame = pipeline.load()?;
    step_done(&format!("{} rows, {} channels", frame.len(), frame.channels().len()));

    step_run("Searching, fitting and forecasting");
    let output = pipeline.run_frame(&frame)?;
    step_done(&format!("{:.1}s", start.elapsed().as_secs_f64()));
    step_ok(&format!("Forecast written to {}", config.output.display()));
    if let Some(path) = &config.report {
        step_ok(&format!("Report written to {}", path.display()));
    }
    if let Some(path) = &config.study {
        step_ok(&format!("Study written to {}", path.display()));
    }

    print_report(&output.report);
    Ok(())
}

fn print_report(report: &PipelineReport) {
    println!();
    line_box_top();
    line_box_center(&format!("{}", "Run summary".white().bold()));
    line_box_sep();
    line_box(&kv("Rows        ", &format!("{} ({} train, {} test)", report.rows, report.train_rows, report.test_rows)));
    line_box(&kv("Cutoff      ", &report.cutoff.to_string()));
    line_box(&kv("Trials      ", &format!("{} ok, {} failed", report.completed_trials, report.failed_trials)));
    line_box(&kv("Best CV MAE ", &format!("{:.4}", report.best_cv_mae)));
    line_box_sep();
    match &report.holdout {
        Some(m) => {
            line_box(&kv("Holdout MAE ", &format!("{:.4}", m.mae)));
            line_box(&kv("Holdout RMSE", &format!("{:.4}", m.rmse)));
            line_box(&kv("Holdout MAPE", &fmt_opt(m.mape, "%")));
        }
        None => line_box(&format!("{}", warn("holdout window empty, no metrics"))),
    }
    line_box(&kv("Sensor MAPE ", &fmt_opt(report.sensor_mape, "%")));
    if let Some(f) = &report.forecast {
        line_box_sep();
        line_box(&kv("Steps       ", &format!("{} from {}", f.steps, f.start)));
        line_box(&kv("Mean        ", &format!("{:.4}", f.mean)));
        line_box(&kv("Peak        ", &format!("{:.4} at {}", f.peak, f.peak_timestamp)));
    }
    line_box_bottom();

    if !report.top_features.is_empty() {
        section("Top features");
        for fi in report.top_features.iter().take(5) {
            println!("  {:<36} {}", fi.feature, accent(&format!("{:.4}", fi.importance)));
        }
    }
    println!();
}

// ─── Info ──────────────────────────────────────────────────────────────────────

pub fn cmd_info(args: &InfoArgs) -> anyhow::Result<()> {
    let pipeline_config = args.to_config()?;
    let pipeline = ForecastPipeline::new(pipeline_config)?;
    let info = pipeline.inspect()?;

    section("Data Info");
    println!("  {:<14} {}", muted("File"), args.data.display());
    println!("  {:<14} {}", muted("Rows"), info.rows);
    println!("  {:<14} {} → {}", muted("Span"), info.start, info.end);
    println!("  {:<14} {}s", muted("Interval"), info.interval_secs);
    println!("  {:<14} {}", muted("Horizon steps"), info.horizon_steps);
    println!("  {:<14} {}", muted("Features"), info.n_features);
    println!("  {:<14} {}", muted("Usable rows"), info.valid_rows);

    section("Exogenous");
    if info.exogenous.is_empty() {
        println!("  {}", dim("none found"));
    }
    for name in &info.exogenous {
        println!("  {}", name);
    }
    println!();
    Ok(())
}
