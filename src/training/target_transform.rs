//! Regressor wrapper that learns on a rescaled target

use super::models::{Diagnostics, Regressor};
use crate::error::{AutomlError, Result};
use crate::optimizer::{strip_regressor_prefix, ParamValue};
use crate::preprocessing::{ScalerType, TargetScaler};
use ndarray::{Array1, Array2};

/// Fits the inner regressor on `scaler(y)` and maps its predictions back
/// with the inverse transform, so callers only ever see the original scale.
#[derive(Debug, Clone)]
pub struct TransformedTargetRegressor {
    regressor: Box<dyn Regressor>,
    scaler: TargetScaler,
    is_fitted: bool,
}

impl TransformedTargetRegressor {
    /// Wrap a regressor with a min-max target scaler
    pub fn new(regressor: Box<dyn Regressor>) -> Self {
        Self::with_scaler(regressor, ScalerType::MinMax)
    }

    pub fn with_scaler(regressor: Box<dyn Regressor>, scaler_type: ScalerType) -> Self {
        Self {
            regressor,
            scaler: TargetScaler::new(scaler_type),
            is_fitted: false,
        }
    }

    /// The wrapped estimator
    pub fn regressor(&self) -> &dyn Regressor {
        self.regressor.as_ref()
    }

    pub fn scaler(&self) -> &TargetScaler {
        &self.scaler
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

impl Regressor for TransformedTargetRegressor {
    fn name(&self) -> &'static str {
        self.regressor.name()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let scaled = self.scaler.fit_transform(y)?;
        self.regressor.fit(x, &scaled)?;
        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(AutomlError::ModelNotFitted);
        }
        let scaled = self.regressor.predict(x)?;
        self.scaler.inverse_transform(&scaled)
    }

    /// Accepts both `alpha` and `regressor__alpha`
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        self.regressor.set_param(strip_regressor_prefix(name), value)
    }

    fn diagnostics(&self) -> Diagnostics {
        self.regressor.diagnostics()
    }

    fn box_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }
}
