//! Target scaling implementations

use crate::error::{AutomlError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// No scaling
    None,
}

/// Parameters for a fitted scaler
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // mean or min
    scale: f64,  // std or range
}

/// Scaler for a one-dimensional target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetScaler {
    scaler_type: ScalerType,
    params: Option<ScalerParams>,
}

impl Default for TargetScaler {
    fn default() -> Self {
        Self::new(ScalerType::MinMax)
    }
}

impl TargetScaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: None,
        }
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    /// Fit the scaler to the target
    pub fn fit(&mut self, y: &Array1<f64>) -> Result<&mut Self> {
        if y.is_empty() {
            return Err(AutomlError::DataError("Cannot scale an empty target".to_string()));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(AutomlError::DataError("Target contains non-finite values".to_string()));
        }

        let (center, scale) = match self.scaler_type {
            ScalerType::Standard => {
                let mean = y.mean().unwrap_or(0.0);
                (mean, y.std(0.0))
            }
            ScalerType::MinMax => {
                let min = y.iter().copied().fold(f64::INFINITY, f64::min);
                let max = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                (min, max - min)
            }
            ScalerType::None => (0.0, 1.0),
        };

        // Constant targets keep their offset only
        let scale = if scale.abs() < f64::EPSILON { 1.0 } else { scale };

        self.params = Some(ScalerParams { center, scale });
        Ok(self)
    }

    pub fn transform(&self, y: &Array1<f64>) -> Result<Array1<f64>> {
        let p = self.params.ok_or(AutomlError::ModelNotFitted)?;
        Ok(y.mapv(|v| (v - p.center) / p.scale))
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, y: &Array1<f64>) -> Result<Array1<f64>> {
        self.fit(y)?;
        self.transform(y)
    }

    pub fn inverse_transform(&self, y: &Array1<f64>) -> Result<Array1<f64>> {
        let p = self.params.ok_or(AutomlError::ModelNotFitted)?;
        Ok(y.mapv(|v| v * p.scale + p.center))
    }
}
