//! Sampling strategies for hyperparameter optimization

use super::search_space::{Parameter, SearchSpace, TrialParams};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, SQRT_2};

/// Type of sampler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerType {
    /// Random sampling
    Random,
    /// Tree-structured Parzen Estimator
    #[default]
    TPE,
}

/// Trait for hyperparameter samplers
pub trait Sampler: Send {
    /// Sample the next set of hyperparameters given the completed trials.
    ///
    /// `history` only holds trials with a finite score.
    fn sample(&mut self, search_space: &SearchSpace, history: &[(TrialParams, f64)]) -> TrialParams;
}

/// Random sampler
#[derive(Debug)]
pub struct RandomSampler {
    rng: Xoshiro256PlusPlus,
}

impl RandomSampler {
    /// Create a new random sampler
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn sample(&mut self, search_space: &SearchSpace, _history: &[(TrialParams, f64)]) -> TrialParams {
        search_space.sample(&mut self.rng)
    }
}

/// Tree-structured Parzen Estimator sampler.
///
/// Splits the history at the `gamma` quantile of the score into a "good" and
/// a "bad" group, fits a one-dimensional Parzen estimator per parameter and
/// group, draws `n_candidates` values from the good estimator and keeps the
/// one maximising `l(x) / g(x)`. Parameters are treated independently.
#[derive(Debug)]
pub struct TPESampler {
    rng: Xoshiro256PlusPlus,
    n_startup_trials: usize,
    gamma: f64,
    n_candidates: usize,
}

impl TPESampler {
    /// Create a new TPE sampler
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            n_startup_trials: 10,
            gamma: 0.25,
            n_candidates: 24,
        }
    }

    /// Set number of startup trials
    pub fn with_n_startup(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    fn sample_parameter(&mut self, param: &Parameter, good: &[f64], bad: &[f64]) -> f64 {
        let (low, high) = param.internal_bounds();
        if high <= low {
            return low;
        }
        let l = ParzenEstimator::fit(good, low, high);
        let g = ParzenEstimator::fit(bad, low, high);

        let mut best_x = low;
        let mut best_score = f64::NEG_INFINITY;
        for _ in 0..self.n_candidates {
            let x = l.sample(&mut self.rng);
            let score = l.log_pdf(x) - g.log_pdf(x);
            if score > best_score {
                best_score = score;
                best_x = x;
            }
        }
        best_x
    }
}

impl Sampler for TPESampler {
    fn sample(&mut self, search_space: &SearchSpace, history: &[(TrialParams, f64)]) -> TrialParams {
        // Use random sampling for startup trials
        if history.len() < self.n_startup_trials.max(1) {
            return search_space.sample(&mut self.rng);
        }

        // stable sort keeps trial order among equal scores
        let mut sorted: Vec<&(TrialParams, f64)> = history.iter().collect();
        sorted.sort_by(|a, b| a.1.total_cmp(&b.1));
        let n_good = ((sorted.len() as f64 * self.gamma).ceil() as usize).clamp(1, sorted.len());
        let (good, bad) = sorted.split_at(n_good);

        let mut params = TrialParams::new();
        for param in search_space.parameters() {
            let observed = |group: &[&(TrialParams, f64)]| -> Vec<f64> {
                group
                    .iter()
                    .filter_map(|(p, _)| p.get(&param.name).and_then(|v| param.to_internal(v)))
                    .filter(|x| x.is_finite())
                    .collect()
            };
            let x = self.sample_parameter(param, &observed(good), &observed(bad));
            params.insert(param.name.clone(), param.from_internal(x));
        }
        params
    }
}

/// Mixture of truncated Gaussians at the observations plus a uniform prior
/// component over the bounds, all with equal weight.
#[derive(Debug)]
struct ParzenEstimator {
    mus: Vec<f64>,
    sigmas: Vec<f64>,
    low: f64,
    high: f64,
}

impl ParzenEstimator {
    fn fit(observations: &[f64], low: f64, high: f64) -> Self {
        let mut mus: Vec<f64> = observations.iter().map(|x| x.clamp(low, high)).collect();
        mus.sort_by(f64::total_cmp);

        let width = high - low;
        let min_sigma = width / (mus.len() as f64 + 1.0).min(100.0);
        let sigmas = (0..mus.len())
            .map(|i| {
                let left = if i == 0 { mus[i] - low } else { mus[i] - mus[i - 1] };
                let right = if i + 1 == mus.len() { high - mus[i] } else { mus[i + 1] - mus[i] };
                left.max(right).clamp(min_sigma, width)
            })
            .collect();

        Self { mus, sigmas, low, high }
    }

    fn n_components(&self) -> usize {
        self.mus.len() + 1
    }

    fn sample(&self, rng: &mut Xoshiro256PlusPlus) -> f64 {
        let k = rng.gen_range(0..self.n_components());
        if k == self.mus.len() {
            return rng.gen_range(self.low..=self.high);
        }
        // rejection into the bounds, then clamp as a last resort
        for _ in 0..16 {
            let x = self.mus[k] + self.sigmas[k] * standard_normal(rng);
            if (self.low..=self.high).contains(&x) {
                return x;
            }
        }
        self.mus[k].clamp(self.low, self.high)
    }

    fn log_pdf(&self, x: f64) -> f64 {
        let uniform = 1.0 / (self.high - self.low);
        let total: f64 = self
            .mus
            .iter()
            .zip(&self.sigmas)
            .map(|(&mu, &sigma)| {
                let mass = normal_cdf((self.high - mu) / sigma) - normal_cdf((self.low - mu) / sigma);
                normal_pdf((x - mu) / sigma) / (sigma * mass.max(1e-12))
            })
            .sum::<f64>()
            + uniform;
        (total / self.n_components() as f64).max(f64::MIN_POSITIVE).ln()
    }
}

/// Box-Muller draw from N(0, 1)
fn standard_normal(rng: &mut Xoshiro256PlusPlus) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Standard normal CDF approximation
fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

/// Standard normal PDF
fn normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Error function approximation (Abramowitz and Stegun)
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

/// Create a sampler from type
pub fn create_sampler(sampler_type: SamplerType, seed: u64, n_startup_trials: usize) -> Box<dyn Sampler> {
    match sampler_type {
        SamplerType::Random => Box::new(RandomSampler::new(seed)),
        SamplerType::TPE => Box::new(TPESampler::new(seed).with_n_startup(n_startup_trials)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ParameterValue;

    fn history_around(center: f64, n: usize) -> Vec<(TrialParams, f64)> {
        (0..n)
            .map(|i| {
                let x = i as f64 / (n - 1) as f64;
                let mut params = TrialParams::new();
                params.insert("x".to_string(), ParameterValue::Float(x));
                (params, (x - center).powi(2))
            })
            .collect()
    }

    #[test]
    fn test_random_sampler() {
        let space = SearchSpace::new().float("lr", 0.001, 0.1).int("n", 10, 100);

        let mut sampler = RandomSampler::new(42);
        let params = sampler.sample(&space, &[]);

        assert!(params.contains_key("lr"));
        assert!(params.contains_key("n"));
    }

    #[test]
    fn test_samplers_are_seeded() {
        let space = SearchSpace::new().float("x", 0.0, 1.0).int("n", 1, 50);
        let history = history_around(0.3, 20);
        let mut a = TPESampler::new(7);
        let mut b = TPESampler::new(7);
        for _ in 0..5 {
            assert_eq!(a.sample(&space, &history), b.sample(&space, &history));
        }
    }

    #[test]
    fn test_tpe_sampler_startup() {
        let space = SearchSpace::new().float("lr", 0.001, 0.1);
        let mut sampler = TPESampler::new(42);

        // During startup, should just do random sampling
        for _ in 0..5 {
            let params = sampler.sample(&space, &[]);
            assert!(params.contains_key("lr"));
        }
    }

    #[test]
    fn test_tpe_concentrates_near_good_region() {
        let space = SearchSpace::new().float("x", 0.0, 1.0);
        let history = history_around(0.8, 41);
        let mut sampler = TPESampler::new(3);

        let proposals: Vec<f64> = (0..50)
            .map(|_| sampler.sample(&space, &history)["x"].as_float().unwrap())
            .collect();
        let mean = proposals.iter().sum::<f64>() / proposals.len() as f64;
        assert!(proposals.iter().all(|x| (0.0..=1.0).contains(x)));
        assert!((mean - 0.8).abs() < 0.2, "mean proposal {}", mean);
    }

    #[test]
    fn test_tpe_respects_int_bounds() {
        let space = SearchSpace::new().int("depth", -1, 20);
        let history: Vec<(TrialParams, f64)> = (0..15)
            .map(|i| {
                let mut params = TrialParams::new();
                params.insert("depth".to_string(), ParameterValue::Int(i - 1));
                (params, i as f64)
            })
            .collect();
        let mut sampler = TPESampler::new(11);
        for _ in 0..30 {
            let depth = sampler.sample(&space, &history)["depth"].as_int().unwrap();
            assert!((-1..=20).contains(&depth));
        }
    }

    #[test]
    fn test_parzen_density_is_higher_near_observations() {
        let est = ParzenEstimator::fit(&[0.5, 0.52, 0.48], 0.0, 1.0);
        assert!(est.log_pdf(0.5) > est.log_pdf(0.05));
    }
}
