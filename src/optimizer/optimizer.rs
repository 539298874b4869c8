//! HyperparameterSearch - sequential model-based study runner

use super::{
    config::OptimizationConfig,
    samplers::{create_sampler, Sampler},
    search_space::{SearchSpace, TrialParams},
};
use crate::error::{ForecastError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of a single trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Trial number
    pub trial_id: usize,
    /// Parameters used
    pub params: TrialParams,
    /// Objective value (+inf for failed trials, stored as null)
    #[serde(with = "score")]
    pub value: f64,
    /// Trial duration in seconds
    pub duration_secs: f64,
    /// Whether the objective errored or returned a non-finite score
    pub failed: bool,
    /// Failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Study containing all trials, in trial-id order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Study {
    /// All trial results
    pub trials: Vec<TrialResult>,
    /// Best trial index
    pub best_trial_idx: Option<usize>,
    /// Total duration
    pub total_duration_secs: f64,
}

impl Study {
    /// Create a new study
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the best trial
    pub fn best_trial(&self) -> Option<&TrialResult> {
        self.best_trial_idx.and_then(|idx| self.trials.get(idx))
    }

    /// Get the best value
    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().map(|t| t.value)
    }

    /// Get the best parameters
    pub fn best_params(&self) -> Option<&TrialParams> {
        self.best_trial().map(|t| &t.params)
    }

    /// Add a trial result. The earliest trial wins ties.
    pub fn add_trial(&mut self, result: TrialResult) {
        let idx = self.trials.len();
        let is_better = !result.failed
            && match self.best_value() {
                None => true,
                Some(best) => result.value < best,
            };
        if is_better {
            self.best_trial_idx = Some(idx);
        }
        self.trials.push(result);
    }

    pub fn n_failed(&self) -> usize {
        self.trials.iter().filter(|t| t.failed).count()
    }

    pub fn n_completed(&self) -> usize {
        self.trials.len() - self.n_failed()
    }

    /// Save study to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load study from a JSON file
    pub fn load(path: &Path) -> Result<Study> {
        let json = std::fs::read_to_string(path)?;
        let study: Study = serde_json::from_str(&json)?;
        Ok(study)
    }
}

/// Minimises an objective over a [`SearchSpace`].
///
/// Trials run in batches of `n_jobs`. Every configuration in a batch is
/// proposed from the trials completed before the batch started, evaluated in
/// parallel and recorded in trial-id order, so the study is identical for any
/// thread count.
pub struct HyperparameterSearch {
    config: OptimizationConfig,
    search_space: SearchSpace,
    sampler: Box<dyn Sampler>,
    study: Study,
}

impl HyperparameterSearch {
    /// Create a new search
    pub fn new(config: OptimizationConfig, search_space: SearchSpace) -> Result<Self> {
        config.validate()?;
        search_space.validate()?;
        let sampler = create_sampler(config.sampler, config.random_state, config.n_startup_trials);
        Ok(Self::with_sampler(config, search_space, sampler))
    }

    /// Create a search driven by a custom sampler
    pub fn with_sampler(
        config: OptimizationConfig,
        search_space: SearchSpace,
        sampler: Box<dyn Sampler>,
    ) -> Self {
        Self {
            config,
            search_space,
            sampler,
            study: Study::new(),
        }
    }

    /// Run optimization with an objective function.
    ///
    /// Fails with `OptimizationError` only if no trial produced a finite score.
    pub fn optimize<F>(&mut self, objective: F) -> Result<&Study>
    where
        F: Fn(&TrialParams) -> Result<f64> + Sync,
    {
        let start = Instant::now();
        let n_trials = self.config.n_trials;
        let n_jobs = self.config.n_jobs.max(1);

        let mut history: Vec<(TrialParams, f64)> = Vec::new();
        let mut trials_without_improvement = 0usize;
        let mut next_id = 0usize;

        while next_id < n_trials {
            if let Some(t) = self.config.timeout_secs {
                if start.elapsed().as_secs_f64() > t {
                    info!(completed = next_id, timeout_secs = t, "Search timeout reached");
                    break;
                }
            }
            if let Some(p) = self.config.early_stopping_patience {
                if trials_without_improvement >= p {
                    info!(completed = next_id, patience = p, "Search stopped without improvement");
                    break;
                }
            }

            let batch = n_jobs.min(n_trials - next_id);
            let proposals: Vec<(usize, TrialParams)> = (0..batch)
                .map(|k| (next_id + k, self.sampler.sample(&self.search_space, &history)))
                .collect();

            let results: Vec<TrialResult> = if batch == 1 {
                proposals
                    .into_iter()
                    .map(|(id, params)| run_trial(id, params, &objective))
                    .collect()
            } else {
                proposals
                    .into_par_iter()
                    .map(|(id, params)| run_trial(id, params, &objective))
                    .collect()
            };

            for result in results {
                if !result.failed {
                    let improved = match self.study.best_value() {
                        None => true,
                        Some(best) => result.value < best - self.config.min_improvement,
                    };
                    if improved {
                        trials_without_improvement = 0;
                    } else {
                        trials_without_improvement += 1;
                    }
                    history.push((result.params.clone(), result.value));
                } else {
                    trials_without_improvement += 1;
                }

                self.study.add_trial(result);
                if let Some(last) = self.study.trials.last() {
                    info!(
                        trial = last.trial_id,
                        value = last.value,
                        best = ?self.study.best_value(),
                        duration_secs = last.duration_secs,
                        "Trial finished"
                    );
                }
            }
            next_id += batch;
        }

        self.study.total_duration_secs = start.elapsed().as_secs_f64();

        if self.study.best_trial().is_none() {
            return Err(ForecastError::OptimizationError(format!(
                "all {} trials failed",
                self.study.trials.len()
            )));
        }
        Ok(&self.study)
    }

    /// Get the study results
    pub fn study(&self) -> &Study {
        &self.study
    }

    pub fn into_study(self) -> Study {
        self.study
    }
}

mod score {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> std::result::Result<S::Ok, S::Error> {
        if value.is_finite() {
            s.serialize_some(value)
        } else {
            s.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::INFINITY))
    }
}

fn run_trial<F>(trial_id: usize, params: TrialParams, objective: &F) -> TrialResult
where
    F: Fn(&TrialParams) -> Result<f64> + Sync,
{
    let trial_start = Instant::now();
    let outcome = objective(&params);
    let duration_secs = trial_start.elapsed().as_secs_f64();

    let (value, error) = match outcome {
        Ok(value) if value.is_finite() => (value, None),
        Ok(value) => (f64::INFINITY, Some(format!("non-finite objective value {}", value))),
        Err(e) => (f64::INFINITY, Some(e.to_string())),
    };
    if let Some(msg) = &error {
        warn!(trial = trial_id, error = %msg, "Trial failed");
    } else {
        debug!(trial = trial_id, ?params, "Trial parameters");
    }

    TrialResult {
        trial_id,
        params,
        value,
        duration_secs,
        failed: error.is_some(),
        error,
    }
}
