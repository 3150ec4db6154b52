//! Linear model implementations

use super::models::{param_bool, param_f64, param_usize, unknown_param, Diagnostics, Regressor};
use crate::error::{AutomlError, Result};
use crate::optimizer::ParamValue;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Lower-triangular Cholesky factor of a symmetric matrix, if it is positive definite
fn cholesky_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    Some(l)
}

/// Solve symmetric positive-definite system Ax = b using Cholesky decomposition.
/// Retries once with a tiny diagonal jitter if the matrix is near-singular.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let l = cholesky_factor(a).or_else(|| {
        let jitter = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
        let mut a_reg = a.clone();
        for k in 0..n {
            a_reg[[k, k]] += jitter;
        }
        cholesky_factor(&a_reg)
    })?;

    // Forward substitution: L * y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Gaussian elimination with partial pivoting (fallback)
fn gaussian_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut m = a.clone();
    let mut rhs = b.clone();

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&r1, &r2| {
            m[[r1, col]]
                .abs()
                .partial_cmp(&m[[r2, col]].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;

        if m[[pivot_row, col]].abs() < 1e-12 {
            return None;
        }
        if pivot_row != col {
            for j in 0..n {
                m.swap([col, j], [pivot_row, j]);
            }
            rhs.swap(col, pivot_row);
        }

        for row in (col + 1)..n {
            let factor = m[[row, col]] / m[[col, col]];
            for j in col..n {
                m[[row, j]] -= factor * m[[col, j]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| m[[i, j]] * x[j]).sum();
        x[i] = (rhs[i] - sum) / m[[i, i]];
    }
    Some(x)
}

fn check_xy(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(AutomlError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(AutomlError::TrainingError("No training samples".to_string()));
    }
    Ok(())
}

/// Center features and target when fitting an intercept
fn center(x: &Array2<f64>, y: &Array1<f64>, fit_intercept: bool) -> (Array2<f64>, Array1<f64>, Array1<f64>, f64) {
    if fit_intercept {
        let xm = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()));
        let ym = y.mean().unwrap_or(0.0);
        (x - &xm.clone().insert_axis(Axis(0)), y - ym, xm, ym)
    } else {
        (x.clone(), y.clone(), Array1::zeros(x.ncols()), 0.0)
    }
}

/// Ridge Regression (L2-regularized linear regression)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    pub fit_intercept: bool,
    /// L2 regularization strength
    pub alpha: f64,
    pub is_fitted: bool,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
            alpha,
            is_fitted: false,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        r2_score(&self.predict(x)?, y)
    }
}

impl Regressor for RidgeRegression {
    fn name(&self) -> &'static str {
        "ridge"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        let n_features = x.ncols();
        let (x_c, y_c, x_mean, y_mean) = center(x, y, self.fit_intercept);

        let mut xtx = x_c.t().dot(&x_c);
        for i in 0..n_features {
            xtx[[i, i]] += self.alpha;
        }
        let xty = x_c.t().dot(&y_c);

        let coefficients = cholesky_solve(&xtx, &xty)
            .or_else(|| gaussian_solve(&xtx, &xty))
            .ok_or_else(|| AutomlError::ComputationError("Singular matrix".to_string()))?;

        self.intercept = Some(y_mean - coefficients.dot(&x_mean));
        self.coefficients = Some(coefficients);
        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(AutomlError::ModelNotFitted)?;
        Ok(x.dot(coefficients) + self.intercept.unwrap_or(0.0))
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "alpha" => self.alpha = param_f64(name, value)?,
            "fit_intercept" => self.fit_intercept = param_bool(name, value)?,
            _ => return Err(unknown_param(self.name(), name, value)),
        }
        Ok(())
    }

    fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            number_of_features: self.coefficients.as_ref().map(|c| c.len()),
            ..Default::default()
        }
    }

    fn box_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }
}

/// Lasso Regression (L1-regularized via coordinate descent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LassoRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    pub fit_intercept: bool,
    /// L1 regularization strength
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    /// Coordinate-descent sweeps run by the last fit
    pub n_iter: Option<usize>,
    pub is_fitted: bool,
}

impl Default for LassoRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LassoRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
            alpha,
            max_iter: 1000,
            tol: 1e-6,
            n_iter: None,
            is_fitted: false,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Soft-threshold operator for L1 proximal step
    fn soft_threshold(val: f64, threshold: f64) -> f64 {
        if val > threshold {
            val - threshold
        } else if val < -threshold {
            val + threshold
        } else {
            0.0
        }
    }

    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        r2_score(&self.predict(x)?, y)
    }
}

impl Regressor for LassoRegression {
    fn name(&self) -> &'static str {
        "lasso"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();
        let (x_c, y_c, x_mean, y_mean) = center(x, y, self.fit_intercept);

        let col_norms: Vec<f64> = (0..n_features)
            .map(|j| x_c.column(j).mapv(|v| v * v).sum())
            .collect();

        let mut w = Array1::zeros(n_features);
        let lambda = self.alpha * n_samples as f64;
        let mut r = y_c.clone();
        let mut sweeps = 0usize;

        for _ in 0..self.max_iter.max(1) {
            sweeps += 1;
            let mut max_change = 0.0f64;

            for j in 0..n_features {
                if col_norms[j] < 1e-15 {
                    w[j] = 0.0;
                    continue;
                }
                // rho = x_j^T r + ||x_j||^2 w_j
                let rho = x_c.column(j).dot(&r) + col_norms[j] * w[j];
                let old_wj = w[j];
                w[j] = Self::soft_threshold(rho, lambda) / col_norms[j];

                let delta = old_wj - w[j];
                if delta != 0.0 {
                    r.scaled_add(delta, &x_c.column(j));
                    max_change = max_change.max(delta.abs());
                }
            }

            if max_change < self.tol {
                break;
            }
        }

        self.intercept = Some(y_mean - w.dot(&x_mean));
        self.coefficients = Some(w);
        self.n_iter = Some(sweeps);
        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(AutomlError::ModelNotFitted)?;
        Ok(x.dot(coefficients) + self.intercept.unwrap_or(0.0))
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "alpha" => self.alpha = param_f64(name, value)?,
            "max_iter" => self.max_iter = param_usize(name, value)?,
            "tol" => self.tol = param_f64(name, value)?,
            "fit_intercept" => self.fit_intercept = param_bool(name, value)?,
            _ => return Err(unknown_param(self.name(), name, value)),
        }
        Ok(())
    }

    fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            iterations: self.n_iter,
            number_of_features: self.coefficients.as_ref().map(|c| c.len()),
            ..Default::default()
        }
    }

    fn box_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }
}

fn r2_score(pred: &Array1<f64>, y: &Array1<f64>) -> Result<f64> {
    let ym = y.mean().unwrap_or(0.0);
    let ss_res = (pred - y).mapv(|v| v * v).sum();
    let ss_tot = y.mapv(|v| (v - ym).powi(2)).sum();
    Ok(if ss_tot == 0.0 { 1.0 } else { 1.0 - ss_res / ss_tot })
}
