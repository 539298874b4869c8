//! Optimization configuration

use super::SamplerType;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for hyperparameter optimization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// Number of trials to run
    pub n_trials: usize,

    /// Maximum time in seconds, checked between batches
    pub timeout_secs: Option<f64>,

    /// Sampler type
    pub sampler: SamplerType,

    /// Number of initial random samples before TPE takes over
    pub n_startup_trials: usize,

    /// Trials evaluated in parallel per batch
    pub n_jobs: usize,

    /// Random seed
    pub random_state: u64,

    /// Stop after this many trials without improvement
    pub early_stopping_patience: Option<usize>,

    /// Minimum improvement to reset the patience counter
    pub min_improvement: f64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            n_trials: 30,
            timeout_secs: None,
            sampler: SamplerType::TPE,
            n_startup_trials: 10,
            n_jobs: 1,
            random_state: 42,
            early_stopping_patience: None,
            min_improvement: 1e-6,
        }
    }
}

impl OptimizationConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set number of trials
    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    /// Builder method to set timeout
    pub fn with_timeout(mut self, secs: f64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Builder method to set sampler
    pub fn with_sampler(mut self, sampler: SamplerType) -> Self {
        self.sampler = sampler;
        self
    }

    /// Builder method to enable parallel execution
    pub fn with_n_jobs(mut self, n: usize) -> Self {
        self.n_jobs = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.early_stopping_patience = Some(patience);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_trials == 0 {
            return Err(ForecastError::InvalidParameter {
                name: "n_trials".into(),
                value: "0".into(),
                reason: "at least one trial is required".into(),
            });
        }
        if self.n_jobs == 0 {
            return Err(ForecastError::InvalidParameter {
                name: "n_jobs".into(),
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        if let Some(t) = self.timeout_secs {
            if !(t.is_finite() && t > 0.0) {
                return Err(ForecastError::InvalidParameter {
                    name: "timeout_secs".into(),
                    value: t.to_string(),
                    reason: "must be positive".into(),
                });
            }
        }
        if self.early_stopping_patience == Some(0) {
            return Err(ForecastError::InvalidParameter {
                name: "early_stopping_patience".into(),
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
