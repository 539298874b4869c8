//! Search space definition for hyperparameters

use crate::error::{ForecastError, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type of parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Continuous float parameter
    Float {
        low: f64,
        high: f64,
        log_scale: bool,
    },
    /// Integer parameter (inclusive bounds)
    Int {
        low: i64,
        high: i64,
        log_scale: bool,
    },
}

/// A single hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    /// Create a float parameter
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float { low, high, log_scale: false },
        }
    }

    /// Create a log-scale float parameter
    pub fn log_float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float { low, high, log_scale: true },
        }
    }

    /// Create an integer parameter
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int { low, high, log_scale: false },
        }
    }

    pub fn validate(&self) -> Result<()> {
        let (low, high, log_scale) = match self.param_type {
            ParameterType::Float { low, high, log_scale } => (low, high, log_scale),
            ParameterType::Int { low, high, log_scale } => (low as f64, high as f64, log_scale),
        };
        if !(low.is_finite() && high.is_finite() && low <= high) {
            return Err(ForecastError::InvalidParameter {
                name: self.name.clone(),
                value: format!("[{}, {}]", low, high),
                reason: "bounds must be finite with low <= high".into(),
            });
        }
        if log_scale && low <= 0.0 {
            return Err(ForecastError::InvalidParameter {
                name: self.name.clone(),
                value: low.to_string(),
                reason: "log-scale bounds must be positive".into(),
            });
        }
        Ok(())
    }

    /// Bounds in the internal continuous space the samplers work in
    pub(crate) fn internal_bounds(&self) -> (f64, f64) {
        match self.param_type {
            ParameterType::Float { low, high, log_scale } => {
                if log_scale { (low.ln(), high.ln()) } else { (low, high) }
            }
            // widen by half a step so the end points get a full bucket
            ParameterType::Int { low, high, log_scale } => {
                let (lo, hi) = (low as f64 - 0.5, high as f64 + 0.5);
                if log_scale { (lo.max(0.5).ln(), hi.ln()) } else { (lo, hi) }
            }
        }
    }

    /// Map a sampled value into the internal continuous space
    pub(crate) fn to_internal(&self, value: &ParameterValue) -> Option<f64> {
        let v = value.as_float()?;
        let log_scale = match self.param_type {
            ParameterType::Float { log_scale, .. } | ParameterType::Int { log_scale, .. } => log_scale,
        };
        Some(if log_scale { v.ln() } else { v })
    }

    /// Map an internal value back, rounding and clamping integers
    pub(crate) fn from_internal(&self, x: f64) -> ParameterValue {
        match self.param_type {
            ParameterType::Float { low, high, log_scale } => {
                let v = if log_scale { x.exp() } else { x };
                ParameterValue::Float(v.clamp(low, high))
            }
            ParameterType::Int { low, high, log_scale } => {
                let v = if log_scale { x.exp() } else { x };
                ParameterValue::Int((v.round() as i64).clamp(low, high))
            }
        }
    }

    /// Sample a random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match self.param_type {
            ParameterType::Float { low, high, log_scale } => {
                let val = if log_scale {
                    let (log_low, log_high) = (low.ln(), high.ln());
                    (rng.gen::<f64>() * (log_high - log_low) + log_low).exp()
                } else {
                    rng.gen::<f64>() * (high - low) + low
                };
                ParameterValue::Float(val.clamp(low, high))
            }
            ParameterType::Int { low, high, log_scale } => {
                if log_scale {
                    let (lo, hi) = self.internal_bounds();
                    self.from_internal(rng.gen::<f64>() * (hi - lo) + lo)
                } else {
                    ParameterValue::Int(rng.gen_range(low..=high))
                }
            }
        }
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
        }
    }

    /// Get as int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) if v.is_finite() => Some(*v as i64),
            ParameterValue::Float(_) => None,
        }
    }
}

/// Search space for hyperparameter optimization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    /// Create a new empty search space
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the search space
    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Add a float parameter
    pub fn float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::float(name, low, high))
    }

    /// Add a log-scale float parameter
    pub fn log_float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::log_float(name, low, high))
    }

    /// Add an integer parameter
    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::int(name, low, high))
    }

    /// Get all parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn validate(&self) -> Result<()> {
        if self.parameters.is_empty() {
            return Err(ForecastError::ConfigError("search space is empty".into()));
        }
        for (i, p) in self.parameters.iter().enumerate() {
            p.validate()?;
            if self.parameters[..i].iter().any(|q| q.name == p.name) {
                return Err(ForecastError::ConfigError(format!(
                    "parameter '{}' defined twice",
                    p.name
                )));
            }
        }
        Ok(())
    }

    /// Sample a random configuration
    pub fn sample(&self, rng: &mut impl Rng) -> TrialParams {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// Sampled configuration, ordered by parameter name
pub type TrialParams = BTreeMap<String, ParameterValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_search_space_builder() {
        let space = SearchSpace::new()
            .float("learning_rate", 0.01, 0.2)
            .int("num_leaves", 20, 200)
            .log_float("min_child_weight", 1e-3, 10.0);

        assert_eq!(space.len(), 3);
        assert!(space.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_bounds() {
        assert!(SearchSpace::new().float("x", 1.0, 0.0).validate().is_err());
        assert!(SearchSpace::new().log_float("x", 0.0, 1.0).validate().is_err());
        assert!(SearchSpace::new().float("x", 0.0, 1.0).float("x", 0.0, 2.0).validate().is_err());
        assert!(SearchSpace::new().validate().is_err());
    }

    #[test]
    fn test_sampling_stays_in_bounds() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let space = SearchSpace::new()
            .float("lr", 0.01, 0.2)
            .int("depth", -1, 20)
            .log_float("mcw", 1e-3, 10.0);

        for _ in 0..200 {
            let params = space.sample(&mut rng);
            let lr = params["lr"].as_float().unwrap();
            let depth = params["depth"].as_int().unwrap();
            let mcw = params["mcw"].as_float().unwrap();
            assert!((0.01..=0.2).contains(&lr));
            assert!((-1..=20).contains(&depth));
            assert!((1e-3..=10.0).contains(&mcw));
        }
    }

    #[test]
    fn test_internal_round_trip_for_ints() {
        let p = Parameter::int("n", 10, 20);
        assert_eq!(p.from_internal(14.6), ParameterValue::Int(15));
        assert_eq!(p.from_internal(25.0), ParameterValue::Int(20));
        assert_eq!(p.to_internal(&ParameterValue::Int(12)), Some(12.0));
    }

    #[test]
    fn test_params_serialize_as_plain_numbers() {
        let mut params = TrialParams::new();
        params.insert("a".into(), ParameterValue::Int(3));
        params.insert("b".into(), ParameterValue::Float(0.5));
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"a":3,"b":0.5}"#);
    }
}
