//! Regression estimators and evaluation helpers
//!
//! Every estimator implements [`Regressor`], which lets the model selector
//! set hyperparameters by name, clone candidates and read back
//! model-specific [`Diagnostics`] after fitting:
//! - Linear models (Ridge, Lasso)
//! - Decision trees, Random Forests and gradient boosting
//! - Neural networks (MLP)

mod config;
mod models;
mod target_transform;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod neural_network;
pub mod random_forest;

pub use config::ModelKind;
pub use cross_validation::{CVSplit, KFold};
pub use decision_tree::{DecisionTree, MaxFeatures, TreeNode};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use linear_models::{LassoRegression, RidgeRegression};
pub use models::{
    large_error_outliers, rmse, Diagnostics, Regressor, LARGE_ERROR_THRESHOLD,
};
pub use neural_network::{Activation, MLPConfig, MLPRegressor, Solver};
pub use random_forest::RandomForest;
pub use target_transform::TransformedTargetRegressor;
