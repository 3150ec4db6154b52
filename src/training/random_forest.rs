//! Bagged regression trees

use super::decision_tree::{DecisionTree, MaxFeatures};
use super::models::{param_bool, param_opt_usize, param_usize, rmse, unknown_param, Diagnostics, Regressor};
use crate::error::{AutomlError, Result};
use crate::optimizer::ParamValue;
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random forest regressor.
///
/// Trees are grown in parallel on bootstrap resamples, each with its own
/// seed derived from `random_state`, and predictions are the mean over trees.
/// With `oob_score` set, the rows a tree never drew are used to estimate the
/// forest's generalisation RMSE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub oob_score: bool,
    pub random_state: Option<u64>,
    trees: Vec<DecisionTree>,
    importances: Option<Array1<f64>>,
    oob_rmse: Option<f64>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

/// A fitted tree plus the rows it was trained on
struct GrownTree {
    tree: DecisionTree,
    in_bag: Vec<bool>,
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            oob_score: false,
            random_state: None,
            trees: Vec::new(),
            importances: None,
            oob_rmse: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_oob_score(mut self, enabled: bool) -> Self {
        self.oob_score = enabled;
        self
    }

    /// Normalised mean of the per-tree impurity importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.importances.as_ref()
    }

    /// Out-of-bag RMSE; `None` unless fitted with bootstrap and `oob_score`
    pub fn oob_rmse(&self) -> Option<f64> {
        self.oob_rmse
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn grow(&self, x: &Array2<f64>, y: &Array1<f64>, seed: u64) -> Result<GrownTree> {
        let n_samples = x.nrows();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let rows: Vec<usize> = if self.bootstrap {
            (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
        } else {
            (0..n_samples).collect()
        };
        let mut in_bag = vec![false; n_samples];
        for &row in &rows {
            in_bag[row] = true;
        }

        let mut tree = DecisionTree::new()
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_max_features(self.max_features)
            .with_random_state(seed);
        tree.max_depth = self.max_depth;
        tree.fit_indices(x, y, &rows)?;

        Ok(GrownTree { tree, in_bag })
    }

    fn average_importances(trees: &[DecisionTree], n_features: usize) -> Array1<f64> {
        let mut summed = Array1::<f64>::zeros(n_features);
        for importances in trees.iter().filter_map(|t| t.feature_importances()) {
            summed += importances;
        }
        let total = summed.sum();
        if total > 0.0 {
            summed /= total;
        }
        summed
    }

    /// RMSE over rows that at least one tree left out of its sample
    fn out_of_bag_rmse(grown: &[GrownTree], x: &Array2<f64>, y: &Array1<f64>) -> Result<Option<f64>> {
        let n_samples = x.nrows();
        let mut sums = vec![0.0; n_samples];
        let mut counts = vec![0usize; n_samples];

        for g in grown {
            let predictions = g.tree.predict(x)?;
            for row in (0..n_samples).filter(|&r| !g.in_bag[r]) {
                sums[row] += predictions[row];
                counts[row] += 1;
            }
        }

        let scored: Vec<usize> = (0..n_samples).filter(|&r| counts[r] > 0).collect();
        if scored.is_empty() {
            return Ok(None);
        }
        let predicted: Array1<f64> = scored.iter().map(|&r| sums[r] / counts[r] as f64).collect();
        let actual: Array1<f64> = scored.iter().map(|&r| y[r]).collect();
        Ok(Some(rmse(&actual, &predicted)?))
    }
}

impl Regressor for RandomForest {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(AutomlError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(AutomlError::TrainingError("No training samples".to_string()));
        }
        if self.n_estimators == 0 {
            return Err(AutomlError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "a forest needs at least one tree".to_string(),
            });
        }

        let base_seed = self.random_state.unwrap_or(42);
        let grown: Vec<GrownTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|i| self.grow(x, y, base_seed.wrapping_add(i as u64)))
            .collect::<Result<_>>()?;

        self.oob_rmse = if self.oob_score && self.bootstrap {
            Self::out_of_bag_rmse(&grown, x, y)?
        } else {
            None
        };
        self.trees = grown.into_iter().map(|g| g.tree).collect();
        self.importances = Some(Self::average_importances(&self.trees, x.ncols()));

        debug!(trees = self.trees.len(), oob_rmse = ?self.oob_rmse, "Random forest fitted");
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(AutomlError::ModelNotFitted);
        }

        let per_tree = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut mean = Array1::<f64>::zeros(x.nrows());
        for predictions in &per_tree {
            mean += predictions;
        }
        Ok(mean / per_tree.len() as f64)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = param_usize(name, value)?,
            "max_depth" => self.max_depth = param_opt_usize(name, value)?,
            "min_samples_split" => self.min_samples_split = param_usize(name, value)?.max(2),
            "min_samples_leaf" => self.min_samples_leaf = param_usize(name, value)?.max(1),
            "max_features" => self.max_features = MaxFeatures::from_param(name, value)?,
            "bootstrap" => self.bootstrap = param_bool(name, value)?,
            "oob_score" => self.oob_score = param_bool(name, value)?,
            "random_state" => self.random_state = param_opt_usize(name, value)?.map(|s| s as u64),
            _ => return Err(unknown_param(self.name(), name, value)),
        }
        Ok(())
    }

    fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            feature_importances: self.importances.as_ref().map(|f| f.to_vec()),
            number_of_features: self.importances.as_ref().map(|f| f.len()),
            ..Default::default()
        }
    }

    fn box_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }
}
