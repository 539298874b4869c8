//! LightGBM-style gradient boosting with leaf-wise tree growth
//!
//! Squared-error regression with:
//! - Leaf-wise (best-first) growth bounded by `num_leaves` and `max_depth`
//! - L1/L2 regularised leaf values and split gains
//! - `min_child_samples` and `min_child_weight` (hessian mass) per child
//! - Per-round row bagging and per-tree column sampling
//! - Early stopping on a validation set, keeping the best iteration

use super::Predictor;
use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::ops::Index;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightGBMConfig {
    /// Boosting round budget
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Maximum leaves per tree
    pub num_leaves: usize,
    /// Depth bound; `None` grows until `num_leaves` is reached
    pub max_depth: Option<usize>,
    /// Minimum samples in each child
    pub min_child_samples: usize,
    /// Minimum hessian sum in each child
    pub min_child_weight: f64,
    /// Fraction of rows drawn (without replacement) per round
    pub subsample: f64,
    /// Fraction of features drawn per tree
    pub colsample_bytree: f64,
    /// L1 regularisation
    pub reg_alpha: f64,
    /// L2 regularisation
    pub reg_lambda: f64,
    /// Stop when validation MAE has not improved for this many rounds
    pub early_stopping_rounds: Option<usize>,
    pub random_state: u64,
}

impl Default for LightGBMConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            num_leaves: 31,
            max_depth: None,
            min_child_samples: 20,
            min_child_weight: 1e-3,
            subsample: 1.0,
            colsample_bytree: 1.0,
            reg_alpha: 0.0,
            reg_lambda: 0.0,
            early_stopping_rounds: None,
            random_state: 42,
        }
    }
}

impl LightGBMConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| ForecastError::InvalidParameter {
            name: name.into(),
            value,
            reason: reason.into(),
        };

        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", "0".into(), "must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid("learning_rate", self.learning_rate.to_string(), "must be positive"));
        }
        if self.num_leaves < 2 {
            return Err(invalid("num_leaves", self.num_leaves.to_string(), "must be at least 2"));
        }
        if self.min_child_samples == 0 {
            return Err(invalid("min_child_samples", "0".into(), "must be at least 1"));
        }
        if !(self.min_child_weight.is_finite() && self.min_child_weight >= 0.0) {
            return Err(invalid(
                "min_child_weight",
                self.min_child_weight.to_string(),
                "must be non-negative",
            ));
        }
        for (name, value) in [("subsample", self.subsample), ("colsample_bytree", self.colsample_bytree)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(invalid(name, value.to_string(), "must be in (0, 1]"));
            }
        }
        for (name, value) in [("reg_alpha", self.reg_alpha), ("reg_lambda", self.reg_lambda)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(name, value.to_string(), "must be non-negative"));
            }
        }
        if self.early_stopping_rounds == Some(0) {
            return Err(invalid("early_stopping_rounds", "0".into(), "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum LGBNode {
    Leaf { value: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<LGBNode>,
        right: Box<LGBNode>,
    },
}

impl LGBNode {
    fn predict<S: Index<usize, Output = f64> + ?Sized>(&self, sample: &S) -> f64 {
        let mut node = self;
        loop {
            match node {
                LGBNode::Leaf { value } => return *value,
                LGBNode::Split { feature, threshold, left, right } => {
                    // NaN goes right, matching "not <= threshold"
                    node = if sample[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn count_splits(&self, counts: &mut [usize]) {
        if let LGBNode::Split { feature, left, right, .. } = self {
            counts[*feature] += 1;
            left.count_splits(counts);
            right.count_splits(counts);
        }
    }
}

// ---- Tree building utilities ----

/// Soft-thresholded gradient sum (L1)
fn threshold_l1(g: f64, alpha: f64) -> f64 {
    if g.abs() <= alpha { 0.0 } else { g - alpha * g.signum() }
}

fn leaf_weight(g: f64, h: f64, lambda: f64, alpha: f64) -> f64 {
    let denom = h + lambda;
    if denom <= 0.0 { 0.0 } else { -threshold_l1(g, alpha) / denom }
}

fn leaf_gain(g: f64, h: f64, lambda: f64, alpha: f64) -> f64 {
    let denom = h + lambda;
    if denom <= 0.0 {
        0.0
    } else {
        let g = threshold_l1(g, alpha);
        g * g / denom
    }
}

fn make_leaf(gradients: &[f64], hessians: &[f64], indices: &[usize], config: &LightGBMConfig) -> LGBNode {
    let g: f64 = indices.iter().map(|&i| gradients[i]).sum();
    let h: f64 = indices.iter().map(|&i| hessians[i]).sum();
    LGBNode::Leaf { value: leaf_weight(g, h, config.reg_lambda, config.reg_alpha) }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    left_indices: Vec<usize>,
    right_indices: Vec<usize>,
}

fn find_best_split_for_feature(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    feature: usize,
    config: &LightGBMConfig,
) -> Option<SplitCandidate> {
    let mut sorted: Vec<(usize, f64)> = indices.iter().map(|&i| (i, x[[i, feature]])).collect();
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

    let total_g: f64 = indices.iter().map(|&i| gradients[i]).sum();
    let total_h: f64 = indices.iter().map(|&i| hessians[i]).sum();
    let parent = leaf_gain(total_g, total_h, config.reg_lambda, config.reg_alpha);

    let mut left_g = 0.0;
    let mut left_h = 0.0;
    let mut best_gain = 0.0;
    let mut best: Option<(f64, usize)> = None;

    for i in 0..sorted.len().saturating_sub(1) {
        left_g += gradients[sorted[i].0];
        left_h += hessians[sorted[i].0];
        let right_g = total_g - left_g;
        let right_h = total_h - left_h;

        let n_left = i + 1;
        let n_right = sorted.len() - n_left;
        if n_left < config.min_child_samples || n_right < config.min_child_samples {
            continue;
        }
        if left_h < config.min_child_weight || right_h < config.min_child_weight {
            continue;
        }
        if sorted[i].1 == sorted[i + 1].1 {
            continue;
        }

        let gain = leaf_gain(left_g, left_h, config.reg_lambda, config.reg_alpha)
            + leaf_gain(right_g, right_h, config.reg_lambda, config.reg_alpha)
            - parent;

        if gain > best_gain {
            best_gain = gain;
            best = Some(((sorted[i].1 + sorted[i + 1].1) / 2.0, n_left));
        }
    }

    let (threshold, pos) = best?;
    Some(SplitCandidate {
        feature,
        threshold,
        gain: best_gain,
        left_indices: sorted[..pos].iter().map(|&(i, _)| i).collect(),
        right_indices: sorted[pos..].iter().map(|&(i, _)| i).collect(),
    })
}

fn best_split(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    features: &[usize],
    config: &LightGBMConfig,
) -> Option<SplitCandidate> {
    if indices.len() < config.min_child_samples * 2 {
        return None;
    }
    let candidates: Vec<SplitCandidate> = features
        .par_iter()
        .filter_map(|&f| find_best_split_for_feature(x, gradients, hessians, indices, f, config))
        .collect();
    // strictly-greater keeps the lowest feature index on ties
    candidates.into_iter().fold(None, |best, c| match best {
        Some(b) if c.gain <= b.gain => Some(b),
        _ => Some(c),
    })
}

struct PendingSplit {
    node_id: usize,
    split: SplitCandidate,
}

impl PartialEq for PendingSplit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for PendingSplit {}
impl PartialOrd for PendingSplit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PendingSplit {
    fn cmp(&self, other: &Self) -> Ordering {
        // higher gain first, then the older node
        self.split
            .gain
            .total_cmp(&other.split.gain)
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

enum NodeSlot {
    Leaf(Vec<usize>),
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

/// Build one tree using leaf-wise (best-first) growth
fn build_lgb_tree(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    features: &[usize],
    config: &LightGBMConfig,
) -> LGBNode {
    let max_depth = config.max_depth.unwrap_or(usize::MAX);
    let mut nodes: Vec<NodeSlot> = vec![NodeSlot::Leaf(indices.to_vec())];
    let mut depths: Vec<usize> = vec![0];
    let mut heap: BinaryHeap<PendingSplit> = BinaryHeap::new();

    if max_depth > 0 {
        if let Some(split) = best_split(x, gradients, hessians, indices, features, config) {
            heap.push(PendingSplit { node_id: 0, split });
        }
    }

    let mut n_leaves = 1usize;
    while n_leaves < config.num_leaves {
        let Some(PendingSplit { node_id, split }) = heap.pop() else {
            break;
        };

        let depth = depths[node_id] + 1;
        let left_id = nodes.len();
        let right_id = left_id + 1;

        if depth < max_depth {
            for (child_id, child_indices) in [(left_id, &split.left_indices), (right_id, &split.right_indices)] {
                if let Some(child) = best_split(x, gradients, hessians, child_indices, features, config) {
                    heap.push(PendingSplit { node_id: child_id, split: child });
                }
            }
        }

        nodes[node_id] = NodeSlot::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_id,
            right: right_id,
        };
        nodes.push(NodeSlot::Leaf(split.left_indices));
        nodes.push(NodeSlot::Leaf(split.right_indices));
        depths.push(depth);
        depths.push(depth);
        n_leaves += 1;
    }

    fn to_node(nodes: &[NodeSlot], idx: usize, g: &[f64], h: &[f64], config: &LightGBMConfig) -> LGBNode {
        match &nodes[idx] {
            NodeSlot::Leaf(indices) => make_leaf(g, h, indices, config),
            NodeSlot::Split { feature, threshold, left, right } => LGBNode::Split {
                feature: *feature,
                threshold: *threshold,
                left: Box::new(to_node(nodes, *left, g, h, config)),
                right: Box::new(to_node(nodes, *right, g, h, config)),
            },
        }
    }
    to_node(&nodes, 0, gradients, hessians, config)
}

fn sample_fraction(n: usize, fraction: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
    if fraction >= 1.0 {
        return (0..n).collect();
    }
    let k = ((n as f64 * fraction).ceil() as usize).clamp(1, n.max(1));
    let mut idx: Vec<usize> = (0..n).collect();
    idx.shuffle(rng);
    idx.truncate(k);
    idx.sort_unstable();
    idx
}

fn mean_absolute_error(y: &Array1<f64>, pred: &[f64]) -> f64 {
    y.iter().zip(pred).map(|(t, p)| (t - p).abs()).sum::<f64>() / y.len() as f64
}

// ============ LightGBM Regressor ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBMRegressor {
    pub config: LightGBMConfig,
    trees: Vec<LGBNode>,
    base_prediction: f64,
    n_features: usize,
    fitted: bool,
    best_iteration: Option<usize>,
    best_score: Option<f64>,
}

impl LightGBMRegressor {
    pub fn new(config: LightGBMConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_prediction: 0.0,
            n_features: 0,
            fitted: false,
            best_iteration: None,
            best_score: None,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_with_eval(x, y, None)
    }

    /// Fit, tracking validation MAE on `eval` after every round.
    ///
    /// With `early_stopping_rounds` set, boosting stops once the validation
    /// MAE has not improved for that many rounds and the ensemble is cut back
    /// to the best iteration.
    pub fn fit_with_eval(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        eval: Option<(&Array2<f64>, &Array1<f64>)>,
    ) -> Result<()> {
        self.config.validate()?;
        let n = x.nrows();
        if n == 0 {
            return Err(ForecastError::TrainingError("Empty dataset".into()));
        }
        if y.len() != n {
            return Err(ForecastError::ShapeError {
                expected: format!("{} targets", n),
                actual: y.len().to_string(),
            });
        }
        if !y.iter().all(|v| v.is_finite()) {
            return Err(ForecastError::TrainingError("Target contains non-finite values".into()));
        }
        if let Some((ex, ey)) = eval {
            if ex.ncols() != x.ncols() || ex.nrows() != ey.len() || ey.is_empty() {
                return Err(ForecastError::ShapeError {
                    expected: format!("non-empty eval set with {} features", x.ncols()),
                    actual: format!("{}x{} / {} targets", ex.nrows(), ex.ncols(), ey.len()),
                });
            }
        }

        let n_features = x.ncols();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        self.trees.clear();
        self.n_features = n_features;
        self.base_prediction = y.mean().unwrap_or(0.0);
        self.best_iteration = None;
        self.best_score = None;

        let mut predictions = vec![self.base_prediction; n];
        let mut eval_predictions = eval.map(|(ex, _)| vec![self.base_prediction; ex.nrows()]);
        let hessians = vec![1.0; n];
        let mut rounds_without_improvement = 0usize;

        for round in 0..self.config.n_estimators {
            let gradients: Vec<f64> = predictions.iter().zip(y.iter()).map(|(&p, &t)| p - t).collect();

            let rows = sample_fraction(n, self.config.subsample, &mut rng);
            let features = sample_fraction(n_features, self.config.colsample_bytree, &mut rng);

            let tree = build_lgb_tree(x, &gradients, &hessians, &rows, &features, &self.config);
            for (i, row) in x.rows().into_iter().enumerate() {
                predictions[i] += self.config.learning_rate * tree.predict(&row);
            }
            if !predictions.iter().all(|p| p.is_finite()) {
                return Err(ForecastError::TrainingError(format!(
                    "non-finite predictions after round {}",
                    round + 1
                )));
            }

            if let (Some((ex, ey)), Some(eval_pred)) = (eval, eval_predictions.as_mut()) {
                for (i, row) in ex.rows().into_iter().enumerate() {
                    eval_pred[i] += self.config.learning_rate * tree.predict(&row);
                }
                let score = mean_absolute_error(ey, eval_pred);
                if !score.is_finite() {
                    return Err(ForecastError::TrainingError(format!(
                        "non-finite validation error after round {}",
                        round + 1
                    )));
                }

                let improved = self.best_score.map_or(true, |best| score < best);
                if improved {
                    self.best_score = Some(score);
                    self.best_iteration = Some(round + 1);
                    rounds_without_improvement = 0;
                } else {
                    rounds_without_improvement += 1;
                }
            }

            self.trees.push(tree);

            if let Some(patience) = self.config.early_stopping_rounds {
                if eval.is_some() && rounds_without_improvement >= patience {
                    debug!(
                        round = round + 1,
                        best_iteration = ?self.best_iteration,
                        "Early stopping"
                    );
                    break;
                }
            }
        }

        if self.config.early_stopping_rounds.is_some() {
            if let Some(best) = self.best_iteration {
                self.trees.truncate(best);
            }
        }

        self.fitted = true;
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_input(x.ncols())?;
        Ok(x.rows()
            .into_iter()
            .map(|row| self.raw_predict(&row))
            .collect())
    }

    fn raw_predict<S: Index<usize, Output = f64> + ?Sized>(&self, sample: &S) -> f64 {
        self.base_prediction
            + self
                .trees
                .iter()
                .map(|t| self.config.learning_rate * t.predict(sample))
                .sum::<f64>()
    }

    fn check_input(&self, n_features: usize) -> Result<()> {
        if !self.fitted {
            return Err(ForecastError::ModelNotFitted);
        }
        if n_features != self.n_features {
            return Err(ForecastError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: n_features.to_string(),
            });
        }
        Ok(())
    }

    /// Number of trees kept in the ensemble
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Round with the lowest validation MAE (1-based), when an eval set was used
    pub fn best_iteration(&self) -> Option<usize> {
        self.best_iteration
    }

    /// Lowest validation MAE seen, when an eval set was used
    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    /// Split-count importances, normalised to sum to 1 (all zero without splits)
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut counts = vec![0usize; self.n_features];
        for tree in &self.trees {
            tree.count_splits(&mut counts);
        }
        let total: usize = counts.iter().sum();
        if total == 0 {
            return vec![0.0; self.n_features];
        }
        counts.iter().map(|&c| c as f64 / total as f64).collect()
    }
}

impl Predictor for LightGBMRegressor {
    fn predict_row(&self, features: &[f64]) -> Result<f64> {
        self.check_input(features.len())?;
        Ok(self.raw_predict(features))
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}
