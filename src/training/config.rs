//! Model catalogue used by the CLI and search configuration

use super::{
    DecisionTree, GradientBoostingRegressor, LassoRegression, MLPRegressor, RandomForest, Regressor, RidgeRegression,
};
use crate::error::{AutomlError, Result};
use crate::optimizer::{param_grid, ParamGrid, ParamValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Estimators available for model selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Ridge,
    Lasso,
    DecisionTree,
    RandomForest,
    GradientBoosting,
    Mlp,
}

impl ModelKind {
    pub const ALL: [ModelKind; 6] = [
        ModelKind::Ridge,
        ModelKind::Lasso,
        ModelKind::DecisionTree,
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
        ModelKind::Mlp,
    ];

    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().replace('-', "_").as_str() {
            "ridge" => Ok(ModelKind::Ridge),
            "lasso" => Ok(ModelKind::Lasso),
            "decision_tree" | "tree" => Ok(ModelKind::DecisionTree),
            "random_forest" | "rf" => Ok(ModelKind::RandomForest),
            "gradient_boosting" | "gbm" => Ok(ModelKind::GradientBoosting),
            "mlp" | "neural_network" => Ok(ModelKind::Mlp),
            other => Err(AutomlError::ConfigError(format!(
                "Unknown model '{}', expected one of: {}",
                other,
                Self::ALL.map(|k| k.name()).join(", ")
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Ridge => "ridge",
            ModelKind::Lasso => "lasso",
            ModelKind::DecisionTree => "decision_tree",
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
            ModelKind::Mlp => "mlp",
        }
    }

    /// Untuned estimator with library defaults
    pub fn default_estimator(&self) -> Box<dyn Regressor> {
        match self {
            ModelKind::Ridge => Box::new(RidgeRegression::default()),
            ModelKind::Lasso => Box::new(LassoRegression::default()),
            ModelKind::DecisionTree => Box::new(DecisionTree::new().with_random_state(42)),
            ModelKind::RandomForest => Box::new(RandomForest::default().with_random_state(42)),
            ModelKind::GradientBoosting => Box::new(GradientBoostingRegressor::default()),
            ModelKind::Mlp => Box::new(MLPRegressor::default()),
        }
    }

    /// A small grid worth searching when the caller supplies none
    pub fn default_grid(&self) -> ParamGrid {
        let floats = |values: &[f64]| values.iter().map(|&v| ParamValue::Float(v)).collect::<Vec<_>>();
        let ints = |values: &[i64]| values.iter().map(|&v| ParamValue::Int(v)).collect::<Vec<_>>();

        match self {
            ModelKind::Ridge => param_grid([("regressor__alpha", floats(&[0.1, 1.0, 10.0, 100.0]))]),
            ModelKind::Lasso => param_grid([("regressor__alpha", floats(&[1e-4, 1e-3, 1e-2, 1e-1]))]),
            ModelKind::DecisionTree => param_grid([
                ("regressor__max_depth", vec![ParamValue::Null, ParamValue::Int(8), ParamValue::Int(16)]),
                ("regressor__min_samples_leaf", ints(&[1, 5])),
            ]),
            ModelKind::RandomForest => param_grid([
                ("regressor__n_estimators", ints(&[100, 200])),
                ("regressor__max_features", vec![ParamValue::Float(1.0), ParamValue::from("sqrt")]),
            ]),
            ModelKind::GradientBoosting => param_grid([
                ("regressor__n_estimators", ints(&[100, 300])),
                ("regressor__learning_rate", floats(&[0.05, 0.1])),
                ("regressor__max_depth", ints(&[3, 5])),
            ]),
            ModelKind::Mlp => param_grid([
                (
                    "regressor__hidden_layer_sizes",
                    vec![ParamValue::IntList(vec![100]), ParamValue::IntList(vec![64, 32])],
                ),
                ("regressor__alpha", floats(&[1e-4, 1e-2])),
            ]),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ModelKind {
    type Err = AutomlError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}
