//! Gradient Boosting implementation
//!
//! Least-squares gradient boosted regression trees: every stage fits a
//! shallow tree to the current residuals and adds it with shrinkage.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::decision_tree::{DecisionTree, MaxFeatures};
use super::models::{param_f64, param_opt_usize, param_usize, unknown_param, Diagnostics, Regressor};
use crate::error::{AutomlError, Result};
use crate::optimizer::ParamValue;

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting stages (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split a node
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row fraction drawn for each stage
    pub subsample: f64,
    /// Features considered at each split
    pub max_features: MaxFeatures,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: Some(3),
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            max_features: MaxFeatures::All,
            random_state: Some(42),
        }
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    initial_prediction: f64,
    feature_importances: Vec<f64>,
    train_loss: Vec<f64>,
    is_fitted: bool,
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            feature_importances: Vec::new(),
            train_loss: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Number of fitted stages
    pub fn n_stages(&self) -> usize {
        self.trees.len()
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n).collect();
        }
        let sample_size = ((n as f64) * self.config.subsample).ceil().max(1.0) as usize;
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
        indices
    }

    fn validate(&self) -> Result<()> {
        let subsample = self.config.subsample;
        if !(subsample > 0.0 && subsample <= 1.0) {
            return Err(AutomlError::InvalidParameter {
                name: "subsample".to_string(),
                value: subsample.to_string(),
                reason: "must lie in (0, 1]".to_string(),
            });
        }
        if self.config.learning_rate <= 0.0 {
            return Err(AutomlError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.config.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn mean_squared(y: &Array1<f64>, predictions: &Array1<f64>) -> f64 {
    y.iter()
        .zip(predictions.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y.len() as f64
}

impl Regressor for GradientBoostingRegressor {
    fn name(&self) -> &'static str {
        "gradient_boosting"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(AutomlError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(AutomlError::TrainingError("No training samples".to_string()));
        }
        self.validate()?;

        self.trees.clear();
        self.train_loss.clear();
        self.initial_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.feature_importances = vec![0.0; n_features];

        for _ in 0..self.config.n_estimators {
            // Negative gradient of squared loss
            let residuals: Array1<f64> = if n_samples > 10000 {
                let preds = &predictions;
                Array1::from_vec(
                    (0..n_samples)
                        .into_par_iter()
                        .map(|i| y[i] - preds[i])
                        .collect(),
                )
            } else {
                y - &predictions
            };

            let sample_indices = self.subsample_indices(n_samples, &mut rng);

            let mut tree = DecisionTree::new()
                .with_min_samples_split(self.config.min_samples_split)
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_max_features(self.config.max_features)
                .with_random_state(rng.gen());
            tree.max_depth = self.config.max_depth;
            tree.fit_indices(x, &residuals, &sample_indices)?;

            let tree_pred = tree.predict(x)?;
            predictions.scaled_add(self.config.learning_rate, &tree_pred);
            self.train_loss.push(mean_squared(y, &predictions));

            if let Some(tree_importance) = tree.feature_importances() {
                for (total, &imp) in self.feature_importances.iter_mut().zip(tree_importance.iter()) {
                    *total += imp;
                }
            }

            self.trees.push(tree);
        }

        // Normalize feature importances
        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(AutomlError::ModelNotFitted);
        }

        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            let tree_pred = tree.predict(x)?;
            predictions.scaled_add(self.config.learning_rate, &tree_pred);
        }
        Ok(predictions)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.config.n_estimators = param_usize(name, value)?,
            "learning_rate" => self.config.learning_rate = param_f64(name, value)?,
            "max_depth" => self.config.max_depth = param_opt_usize(name, value)?,
            "min_samples_split" => self.config.min_samples_split = param_usize(name, value)?.max(2),
            "min_samples_leaf" => self.config.min_samples_leaf = param_usize(name, value)?.max(1),
            "subsample" => self.config.subsample = param_f64(name, value)?,
            "max_features" => self.config.max_features = MaxFeatures::from_param(name, value)?,
            "random_state" => self.config.random_state = param_opt_usize(name, value)?.map(|s| s as u64),
            "loss" => match value.as_string() {
                Some("squared_error") => {}
                _ => {
                    return Err(AutomlError::InvalidParameter {
                        name: name.to_string(),
                        value: value.to_string(),
                        reason: "only squared_error is supported".to_string(),
                    })
                }
            },
            _ => return Err(unknown_param(self.name(), name, value)),
        }
        Ok(())
    }

    fn diagnostics(&self) -> Diagnostics {
        if self.trees.is_empty() {
            return Diagnostics::default();
        }
        Diagnostics {
            iterations: Some(self.trees.len()),
            loss_curve: Some(self.train_loss.clone()),
            loss: self.train_loss.last().copied(),
            best_loss: self.train_loss.iter().copied().reduce(f64::min),
            feature_importances: Some(self.feature_importances.clone()),
            ..Default::default()
        }
    }

    fn box_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((100, 2), (0..200).map(|i| i as f64 * 0.1).collect()).unwrap();

        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| row[0] * 2.0 + row[1] * 0.5 + 1.0)
            .collect();

        (x, y)
    }

    #[test]
    fn test_gradient_boosting_regressor() {
        let (x, y) = create_regression_data();
        let config = GradientBoostingConfig {
            n_estimators: 10,
            max_depth: Some(3),
            learning_rate: 0.1,
            ..Default::default()
        };

        let mut model = GradientBoostingRegressor::new(config);
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        assert_eq!(predictions.len(), 100);

        let mse = mean_squared(&y, &predictions);
        let y_var = y.var(0.0);
        assert!(mse < y_var, "MSE ({}) should be less than variance ({})", mse, y_var);
    }

    #[test]
    fn test_loss_curve_decreases() {
        let (x, y) = create_regression_data();
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 20,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let diagnostics = model.diagnostics();
        let curve = diagnostics.loss_curve.unwrap();
        assert_eq!(curve.len(), 20);
        assert_eq!(diagnostics.iterations, Some(20));
        assert!(curve.windows(2).all(|w| w[1] <= w[0] + 1e-9));
        assert_eq!(diagnostics.loss, curve.last().copied());
    }

    #[test]
    fn test_feature_importances() {
        let (x, y) = create_regression_data();
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 10,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let importances = model.feature_importances();
        assert_eq!(importances.len(), 2);

        let sum: f64 = importances.iter().sum();
        assert!((sum - 1.0).abs() < 0.01, "Sum of importances ({}) should be ~1", sum);
    }

    #[test]
    fn test_subsample_is_seeded() {
        let (x, y) = create_regression_data();
        let config = GradientBoostingConfig {
            n_estimators: 5,
            subsample: 0.5,
            random_state: Some(3),
            ..Default::default()
        };
        let mut a = GradientBoostingRegressor::new(config.clone());
        let mut b = GradientBoostingRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_set_param() {
        let mut model = GradientBoostingRegressor::default();
        model.set_param("learning_rate", &ParamValue::Float(0.05)).unwrap();
        model.set_param("max_depth", &ParamValue::Null).unwrap();
        assert_eq!(model.config().learning_rate, 0.05);
        assert_eq!(model.config().max_depth, None);
        assert!(model.set_param("loss", &ParamValue::from("huber")).is_err());
        assert!(model.set_param("alpha", &ParamValue::Float(1.0)).is_err());
        assert!(model.predict(&Array2::zeros((1, 2))).is_err());
    }
}
