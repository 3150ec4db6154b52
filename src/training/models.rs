//! Regressor trait, diagnostics and error metrics

use crate::error::{AutomlError, Result};
use crate::optimizer::ParamValue;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::debug;

/// Squared error above which a prediction is flagged as a large-error outlier
pub const LARGE_ERROR_THRESHOLD: f64 = 1e17;

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(AutomlError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(AutomlError::ValidationError("Cannot score zero samples".to_string()));
    }
    Ok(())
}

/// Root-mean-squared error
pub fn rmse(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let mse = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64;
    Ok(mse.sqrt())
}

/// Rows whose squared prediction error exceeds `threshold`
pub fn large_error_outliers(y_pred: &Array1<f64>, y_true: &Array1<f64>, threshold: f64) -> Result<Vec<usize>> {
    check_lengths(y_true, y_pred)?;

    let rows: Vec<usize> = y_pred
        .iter()
        .zip(y_true.iter())
        .enumerate()
        .filter(|(_, (p, t))| (*p - *t).powi(2) > threshold)
        .map(|(i, _)| i)
        .collect();

    for &i in &rows {
        debug!(row = i, predicted = y_pred[i], actual = y_true[i], "Large prediction error");
    }
    Ok(rows)
}

/// Fitted-model introspection, filled in according to what a model exposes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Solver iterations (iterative and neural models)
    pub iterations: Option<usize>,
    /// Training loss per epoch
    pub loss_curve: Option<Vec<f64>>,
    /// Final training loss
    pub loss: Option<f64>,
    /// Lowest training loss seen
    pub best_loss: Option<f64>,
    /// Number of input features (linear models)
    pub number_of_features: Option<usize>,
    /// Impurity-based importances, one per feature (tree models)
    pub feature_importances: Option<Vec<f64>>,
}

/// Trait for regression estimators taking part in model selection
pub trait Regressor: Send + Sync + Debug {
    /// Short model name
    fn name(&self) -> &'static str;

    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Set a hyperparameter by name; unknown names are rejected
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()>;

    /// Introspection of the fitted model
    fn diagnostics(&self) -> Diagnostics {
        Diagnostics::default()
    }

    /// Clone into a fresh box
    fn box_clone(&self) -> Box<dyn Regressor>;
}

impl Clone for Box<dyn Regressor> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Error for a parameter name the model does not know
pub fn unknown_param(model: &str, name: &str, value: &ParamValue) -> AutomlError {
    AutomlError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: format!("unknown parameter for {}", model),
    }
}

fn invalid(name: &str, value: &ParamValue, expected: &str) -> AutomlError {
    AutomlError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: format!("expected {}", expected),
    }
}

pub fn param_f64(name: &str, value: &ParamValue) -> Result<f64> {
    value.as_float().ok_or_else(|| invalid(name, value, "a number"))
}

pub fn param_usize(name: &str, value: &ParamValue) -> Result<usize> {
    value
        .as_int()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| invalid(name, value, "a non-negative integer"))
}

/// `null` maps to `None`
pub fn param_opt_usize(name: &str, value: &ParamValue) -> Result<Option<usize>> {
    if value.is_null() {
        return Ok(None);
    }
    param_usize(name, value).map(Some)
}

pub fn param_str<'a>(name: &str, value: &'a ParamValue) -> Result<&'a str> {
    value.as_string().ok_or_else(|| invalid(name, value, "a string"))
}

pub fn param_bool(name: &str, value: &ParamValue) -> Result<bool> {
    value.as_bool().ok_or_else(|| invalid(name, value, "a boolean"))
}

pub fn param_usize_list(name: &str, value: &ParamValue) -> Result<Vec<usize>> {
    value
        .as_int_list()
        .and_then(|v| v.into_iter().map(|x| usize::try_from(x).ok()).collect())
        .ok_or_else(|| invalid(name, value, "a list of non-negative integers"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_rmse() {
        let y_true = array![0.0, 0.0];
        let y_pred = array![3.0, 4.0];
        assert!((rmse(&y_true, &y_pred).unwrap() - 12.5f64.sqrt()).abs() < 1e-12);
        assert!(rmse(&y_true, &array![1.0]).is_err());
    }

    #[test]
    fn test_large_error_outliers() {
        let truth = array![1e6, 2e6, 3e6];
        let pred = array![1e6, 2e6 + 4e8, 3e6 - 2e8];
        let rows = large_error_outliers(&pred, &truth, LARGE_ERROR_THRESHOLD).unwrap();
        assert_eq!(rows, vec![1]);
    }

    #[test]
    fn test_param_helpers() {
        assert_eq!(param_f64("alpha", &ParamValue::Int(2)).unwrap(), 2.0);
        assert_eq!(param_opt_usize("max_depth", &ParamValue::Null).unwrap(), None);
        assert_eq!(param_usize_list("h", &ParamValue::IntList(vec![8, 4])).unwrap(), vec![8, 4]);
        assert!(param_usize("n", &ParamValue::Int(-1)).is_err());
        assert!(param_str("solver", &ParamValue::Float(1.0)).is_err());
    }
}
