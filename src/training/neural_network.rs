//! Neural Network (Multi-Layer Perceptron) implementation
//!
//! A feedforward regression network trained with mini-batch backpropagation
//! on half squared error plus an L2 penalty. Training stops after `max_iter`
//! epochs or once the epoch loss has failed to improve by `tol` for
//! `n_iter_no_change` consecutive epochs.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::{
    param_f64, param_opt_usize, param_str, param_usize, param_usize_list, unknown_param, Diagnostics, Regressor,
};
use crate::error::{AutomlError, Result};
use crate::optimizer::ParamValue;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;

/// Hidden-layer activation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Activation {
    /// Rectified Linear Unit
    #[default]
    ReLU,
    /// Logistic sigmoid
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
    /// Identity
    Linear,
}

impl Activation {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "relu" => Some(Self::ReLU),
            "logistic" | "sigmoid" => Some(Self::Sigmoid),
            "tanh" => Some(Self::Tanh),
            "identity" | "linear" => Some(Self::Linear),
            _ => None,
        }
    }
}

/// Weight update rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Solver {
    #[default]
    Adam,
    /// Stochastic gradient descent with momentum
    Sgd,
}

/// Neural Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Activation function for hidden layers
    pub activation: Activation,
    pub solver: Solver,
    /// Initial learning rate
    pub learning_rate: f64,
    /// Maximum number of epochs
    pub max_iter: usize,
    /// Mini-batch size; `None` uses `min(200, n_samples)`
    pub batch_size: Option<usize>,
    /// L2 regularization
    pub alpha: f64,
    /// Random seed
    pub random_state: Option<u64>,
    /// Minimum loss improvement counted as progress
    pub tol: f64,
    /// Epochs without progress before stopping
    pub n_iter_no_change: usize,
    /// Momentum (sgd only)
    pub momentum: f64,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100],
            activation: Activation::ReLU,
            solver: Solver::Adam,
            learning_rate: 0.001,
            max_iter: 200,
            batch_size: None,
            alpha: 0.0001,
            random_state: Some(42),
            tol: 1e-4,
            n_iter_no_change: 10,
            momentum: 0.9,
        }
    }
}

/// First and second moment buffers, one per layer
#[derive(Debug, Clone)]
struct OptimizerState {
    m_w: Vec<Array2<f64>>,
    m_b: Vec<Array1<f64>>,
    v_w: Vec<Array2<f64>>,
    v_b: Vec<Array1<f64>>,
    step: i32,
}

impl OptimizerState {
    fn new(weights: &[Array2<f64>], biases: &[Array1<f64>]) -> Self {
        let zeros_w: Vec<Array2<f64>> = weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect();
        let zeros_b: Vec<Array1<f64>> = biases.iter().map(|b| Array1::zeros(b.len())).collect();
        Self {
            m_w: zeros_w.clone(),
            m_b: zeros_b.clone(),
            v_w: zeros_w,
            v_b: zeros_b,
            step: 0,
        }
    }
}

/// Multi-Layer Perceptron Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPRegressor {
    config: MLPConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    n_features: usize,
    loss_curve: Vec<f64>,
    best_loss: f64,
    is_fitted: bool,
}

impl Default for MLPRegressor {
    fn default() -> Self {
        Self::new(MLPConfig::default())
    }
}

impl MLPRegressor {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: 0,
            loss_curve: Vec::new(),
            best_loss: f64::INFINITY,
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &MLPConfig {
        &self.config
    }

    /// Epochs actually run
    pub fn n_iter(&self) -> usize {
        self.loss_curve.len()
    }

    fn initialize_weights(&mut self, rng: &mut Xoshiro256PlusPlus) -> Result<()> {
        self.weights.clear();
        self.biases.clear();

        let mut layer_sizes = vec![self.n_features];
        layer_sizes.extend(&self.config.hidden_layers);
        layer_sizes.push(1);

        for pair in layer_sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);

            // Glorot uniform; sigmoid units get a wider range
            let factor = if self.config.activation == Activation::Sigmoid { 2.0 } else { 6.0 };
            let bound = (factor / (n_in + n_out) as f64).sqrt();

            let weights: Vec<f64> = (0..n_in * n_out).map(|_| rng.gen_range(-bound..bound)).collect();
            let biases: Vec<f64> = (0..n_out).map(|_| rng.gen_range(-bound..bound)).collect();

            self.weights.push(Array2::from_shape_vec((n_in, n_out), weights)?);
            self.biases.push(Array1::from_vec(biases));
        }
        Ok(())
    }

    fn forward(&self, x: &Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
        let mut activations = vec![x.clone()];
        let mut z_values = Vec::with_capacity(self.weights.len());
        let last = self.weights.len().saturating_sub(1);

        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = activations[i].dot(w) + b;
            let a = if i < last {
                activate(&z, self.config.activation)
            } else {
                // Linear output for regression
                z.clone()
            };
            z_values.push(z);
            activations.push(a);
        }

        (activations, z_values)
    }

    fn backward(
        &self,
        y: &Array1<f64>,
        activations: &[Array2<f64>],
        z_values: &[Array2<f64>],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let n = y.len() as f64;
        let mut gradients = Vec::with_capacity(self.weights.len());

        // Squared error gradient at the output
        let y_2d = y.clone().insert_axis(Axis(1));
        let mut delta = (&activations[activations.len() - 1] - &y_2d) / n;

        for i in (0..self.weights.len()).rev() {
            let grad_w = activations[i].t().dot(&delta) + &self.weights[i] * (self.config.alpha / n);
            let grad_b = delta.sum_axis(Axis(0));
            gradients.push((grad_w, grad_b));

            if i > 0 {
                delta = delta.dot(&self.weights[i].t()) * activate_derivative(&z_values[i - 1], self.config.activation);
            }
        }

        gradients.reverse();
        gradients
    }

    fn apply_gradients(&mut self, gradients: Vec<(Array2<f64>, Array1<f64>)>, state: &mut OptimizerState) {
        let lr = self.config.learning_rate;
        match self.config.solver {
            Solver::Adam => {
                state.step += 1;
                let correction = (1.0 - ADAM_BETA2.powi(state.step)).sqrt() / (1.0 - ADAM_BETA1.powi(state.step));
                let step_size = lr * correction;
                for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
                    state.m_w[i] = &state.m_w[i] * ADAM_BETA1 + &grad_w * (1.0 - ADAM_BETA1);
                    state.m_b[i] = &state.m_b[i] * ADAM_BETA1 + &grad_b * (1.0 - ADAM_BETA1);
                    state.v_w[i] = &state.v_w[i] * ADAM_BETA2 + &grad_w.mapv(|g| g * g) * (1.0 - ADAM_BETA2);
                    state.v_b[i] = &state.v_b[i] * ADAM_BETA2 + &grad_b.mapv(|g| g * g) * (1.0 - ADAM_BETA2);

                    let update_w = &state.m_w[i] / &state.v_w[i].mapv(|v| v.sqrt() + ADAM_EPSILON);
                    let update_b = &state.m_b[i] / &state.v_b[i].mapv(|v| v.sqrt() + ADAM_EPSILON);
                    self.weights[i].scaled_add(-step_size, &update_w);
                    self.biases[i].scaled_add(-step_size, &update_b);
                }
            }
            Solver::Sgd => {
                let momentum = self.config.momentum;
                for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
                    state.m_w[i] = &state.m_w[i] * momentum - &grad_w * lr;
                    state.m_b[i] = &state.m_b[i] * momentum - &grad_b * lr;
                    self.weights[i] += &state.m_w[i];
                    self.biases[i] += &state.m_b[i];
                }
            }
        }
    }

    fn penalty(&self, n_samples: usize) -> f64 {
        let squared: f64 = self.weights.iter().map(|w| w.iter().map(|v| v * v).sum::<f64>()).sum();
        self.config.alpha * squared / (2.0 * n_samples as f64)
    }
}

fn activate(z: &Array2<f64>, activation: Activation) -> Array2<f64> {
    match activation {
        Activation::ReLU => z.mapv(|v| v.max(0.0)),
        Activation::Sigmoid => z.mapv(|v| 1.0 / (1.0 + (-v).exp())),
        Activation::Tanh => z.mapv(|v| v.tanh()),
        Activation::Linear => z.clone(),
    }
}

fn activate_derivative(z: &Array2<f64>, activation: Activation) -> Array2<f64> {
    match activation {
        Activation::ReLU => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
        Activation::Sigmoid => z.mapv(|v| {
            let s = 1.0 / (1.0 + (-v).exp());
            s * (1.0 - s)
        }),
        Activation::Tanh => z.mapv(|v| 1.0 - v.tanh().powi(2)),
        Activation::Linear => Array2::ones(z.raw_dim()),
    }
}

impl Regressor for MLPRegressor {
    fn name(&self) -> &'static str {
        "mlp"
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
        if self.config.hidden_layers.contains(&0) {
            return Err(AutomlError::InvalidParameter {
                name: "hidden_layer_sizes".to_string(),
                value: format!("{:?}", self.config.hidden_layers),
                reason: "layers need at least one unit".to_string(),
            });
        }

        self.n_features = x.ncols();
        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        self.initialize_weights(&mut rng)?;

        let batch_size = self.config.batch_size.unwrap_or(200).clamp(1, n_samples);
        let mut state = OptimizerState::new(&self.weights, &self.biases);
        self.loss_curve.clear();
        self.best_loss = f64::INFINITY;
        let mut no_improvement = 0;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        for epoch in 0..self.config.max_iter {
            indices.shuffle(&mut rng);

            let mut accumulated = 0.0;
            for batch in indices.chunks(batch_size) {
                let x_batch = x.select(Axis(0), batch);
                let y_batch: Array1<f64> = batch.iter().map(|&i| y[i]).collect();

                let (activations, z_values) = self.forward(&x_batch);
                let output = &activations[activations.len() - 1];
                accumulated += output
                    .column(0)
                    .iter()
                    .zip(y_batch.iter())
                    .map(|(p, t)| (p - t).powi(2))
                    .sum::<f64>()
                    / 2.0;

                let gradients = self.backward(&y_batch, &activations, &z_values);
                self.apply_gradients(gradients, &mut state);
            }

            let loss = accumulated / n_samples as f64 + self.penalty(n_samples);
            if !loss.is_finite() {
                return Err(AutomlError::ComputationError(format!(
                    "MLP training diverged at epoch {}",
                    epoch + 1
                )));
            }
            self.loss_curve.push(loss);

            if loss > self.best_loss - self.config.tol {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            self.best_loss = self.best_loss.min(loss);

            if no_improvement > self.config.n_iter_no_change {
                debug!(epoch = epoch + 1, loss, "MLP training converged");
                break;
            }
        }

        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(AutomlError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(AutomlError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let (activations, _) = self.forward(x);
        Ok(activations[activations.len() - 1].column(0).to_owned())
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "hidden_layer_sizes" => self.config.hidden_layers = param_usize_list(name, value)?,
            "activation" => {
                let raw = param_str(name, value)?;
                self.config.activation = Activation::from_name(raw).ok_or_else(|| AutomlError::InvalidParameter {
                    name: name.to_string(),
                    value: raw.to_string(),
                    reason: "expected relu, logistic, tanh or identity".to_string(),
                })?;
            }
            "solver" => {
                self.config.solver = match param_str(name, value)? {
                    "adam" => Solver::Adam,
                    "sgd" => Solver::Sgd,
                    other => {
                        return Err(AutomlError::InvalidParameter {
                            name: name.to_string(),
                            value: other.to_string(),
                            reason: "expected adam or sgd".to_string(),
                        })
                    }
                }
            }
            "alpha" => self.config.alpha = param_f64(name, value)?,
            "learning_rate_init" => self.config.learning_rate = param_f64(name, value)?,
            "max_iter" => self.config.max_iter = param_usize(name, value)?,
            "batch_size" => {
                self.config.batch_size = match value.as_string() {
                    Some("auto") => None,
                    _ => param_opt_usize(name, value)?,
                }
            }
            "random_state" => self.config.random_state = param_opt_usize(name, value)?.map(|s| s as u64),
            "tol" => self.config.tol = param_f64(name, value)?,
            "n_iter_no_change" => self.config.n_iter_no_change = param_usize(name, value)?,
            "momentum" => self.config.momentum = param_f64(name, value)?,
            _ => return Err(unknown_param(self.name(), name, value)),
        }
        Ok(())
    }

    fn diagnostics(&self) -> Diagnostics {
        if !self.is_fitted {
            return Diagnostics::default();
        }
        Diagnostics {
            iterations: Some(self.n_iter()),
            loss_curve: Some(self.loss_curve.clone()),
            loss: self.loss_curve.last().copied(),
            best_loss: Some(self.best_loss),
            ..Default::default()
        }
    }

    fn box_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }
}
