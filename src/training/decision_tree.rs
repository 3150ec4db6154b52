//! Regression tree implementation

use super::models::{param_opt_usize, param_str, param_usize, unknown_param, Diagnostics, Regressor};
use crate::error::{AutomlError, Result};
use crate::optimizer::ParamValue;
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    /// Number of features to draw at each split
    pub fn resolve(&self, n_features: usize) -> usize {
        match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }

    /// Parse the sklearn-style `max_features` value
    pub fn from_param(name: &str, value: &ParamValue) -> Result<Self> {
        match value {
            ParamValue::Null => Ok(MaxFeatures::All),
            ParamValue::Int(n) if *n > 0 => Ok(MaxFeatures::Fixed(*n as usize)),
            ParamValue::Float(f) if *f > 0.0 && *f <= 1.0 => Ok(MaxFeatures::Fraction(*f)),
            ParamValue::String(s) => match s.as_str() {
                "sqrt" => Ok(MaxFeatures::Sqrt),
                "log2" => Ok(MaxFeatures::Log2),
                "auto" | "all" => Ok(MaxFeatures::All),
                _ => Err(AutomlError::InvalidParameter {
                    name: name.to_string(),
                    value: s.clone(),
                    reason: "expected sqrt, log2, auto, a count or a fraction".to_string(),
                }),
            },
            other => Err(AutomlError::InvalidParameter {
                name: name.to_string(),
                value: other.to_string(),
                reason: "expected sqrt, log2, auto, a count or a fraction".to_string(),
            }),
        }
    }
}

/// Best split found for one feature
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    /// Reduction in summed squared error
    gain: f64,
}

/// Regression tree with squared-error splits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered at each split
    pub max_features: MaxFeatures,
    /// Seed for feature subsampling
    pub random_state: Option<u64>,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            random_state: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit on the rows of `x` listed in `indices` (repeats allowed)
    pub fn fit_indices(&mut self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(AutomlError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if indices.is_empty() {
            return Err(AutomlError::TrainingError("No training samples".to_string()));
        }

        self.n_features = x.ncols();
        let mut importances = vec![0.0; self.n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));

        self.root = Some(self.build_tree(x, y, indices, 0, &mut importances, &mut rng));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(())
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let value = indices.iter().map(|&i| y[i]).sum::<f64>() / n_samples as f64;

        // Check stopping conditions
        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure(y, indices);

        if should_stop {
            return TreeNode::Leaf { value, n_samples };
        }

        let features = self.candidate_features(rng);
        let best = match self.find_best_split(x, y, indices, &features) {
            Some(best) => best,
            None => return TreeNode::Leaf { value, n_samples },
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        importances[best.feature_idx] += best.gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let n_try = self.max_features.resolve(self.n_features);
        if n_try >= self.n_features {
            (0..self.n_features).collect()
        } else {
            let mut picked = sample(rng, self.n_features, n_try).into_vec();
            picked.sort_unstable();
            picked
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
    ) -> Option<SplitCandidate> {
        let min_leaf = self.min_samples_leaf.max(1);
        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let parent_sse = total_sq - total_sum * total_sum / n as f64;

        // Each feature independently finds its best split
        let results: Vec<SplitCandidate> = features
            .par_iter()
            .filter_map(|&feature_idx| {
                let mut order: Vec<usize> = indices.to_vec();
                order.sort_by(|&a, &b| {
                    x[[a, feature_idx]]
                        .partial_cmp(&x[[b, feature_idx]])
                        .unwrap_or(Ordering::Equal)
                });

                let mut best: Option<SplitCandidate> = None;
                let mut left_sum = 0.0f64;
                let mut left_sq = 0.0f64;

                for pos in 0..n - 1 {
                    let yi = y[order[pos]];
                    left_sum += yi;
                    left_sq += yi * yi;

                    let left_count = pos + 1;
                    let right_count = n - left_count;
                    if left_count < min_leaf || right_count < min_leaf {
                        continue;
                    }

                    let here = x[[order[pos], feature_idx]];
                    let next = x[[order[pos + 1], feature_idx]];
                    if next <= here {
                        continue;
                    }

                    let right_sum = total_sum - left_sum;
                    let right_sq = total_sq - left_sq;
                    let left_sse = left_sq - left_sum * left_sum / left_count as f64;
                    let right_sse = right_sq - right_sum * right_sum / right_count as f64;
                    let gain = parent_sse - left_sse - right_sse;

                    if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold: (here + next) / 2.0,
                            gain,
                        });
                    }
                }

                best
            })
            .collect();

        // Ties go to the lowest feature index
        results.into_iter().fold(None, |acc: Option<SplitCandidate>, c| match acc {
            Some(a) if a.gain >= c.gain => Some(a),
            _ => Some(c),
        })
    }

    fn predict_sample(node: &TreeNode, sample: ArrayView1<f64>) -> f64 {
        match node {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if sample[*feature_idx] <= *threshold {
                    Self::predict_sample(left, sample)
                } else {
                    Self::predict_sample(right, sample)
                }
            }
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth (a lone leaf has depth 1)
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

fn is_pure(y: &Array1<f64>, indices: &[usize]) -> bool {
    let first = y[indices[0]];
    indices.iter().all(|&i| (y[i] - first).abs() < 1e-10)
}

impl Regressor for DecisionTree {
    fn name(&self) -> &'static str {
        "decision_tree"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_indices(x, y, &indices)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(AutomlError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(AutomlError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.rows().into_iter().map(|row| Self::predict_sample(root, row)).collect())
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "max_depth" => self.max_depth = param_opt_usize(name, value)?,
            "min_samples_split" => self.min_samples_split = param_usize(name, value)?.max(2),
            "min_samples_leaf" => self.min_samples_leaf = param_usize(name, value)?.max(1),
            "max_features" => self.max_features = MaxFeatures::from_param(name, value)?,
            "random_state" => self.random_state = param_opt_usize(name, value)?.map(|s| s as u64),
            "criterion" => match param_str(name, value)? {
                "squared_error" | "mse" => {}
                other => {
                    return Err(AutomlError::InvalidParameter {
                        name: name.to_string(),
                        value: other.to_string(),
                        reason: "only squared_error is supported".to_string(),
                    })
                }
            },
            _ => return Err(unknown_param(self.name(), name, value)),
        }
        Ok(())
    }

    fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            feature_importances: self.feature_importances.as_ref().map(|f| f.to_vec()),
            ..Default::default()
        }
    }

    fn box_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }
}
