//! Statistical imputation module
//!
//! Fills the missing cells of the fully numeric feature matrix. The imputer
//! is fitted on the training matrix and applied unchanged to the test matrix;
//! missing cells are NaN.

mod knn;

pub use knn::{KNNImputer, NeighborWeights};

use crate::error::Result;
use ndarray::Array2;

/// A fit-on-train, apply-to-both gap filler
pub trait Imputer: Send + Sync {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Fill gaps in `x`; columns must match the fitted matrix
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

#[inline]
pub fn is_missing(v: f64) -> bool {
    v.is_nan()
}

/// Number of NaN cells in a feature matrix
pub fn count_missing(x: &Array2<f64>) -> usize {
    x.iter().filter(|v| is_missing(**v)).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_count_missing() {
        let x = array![[1.0, f64::NAN], [f64::NAN, f64::NAN], [3.0, 4.0]];
        assert_eq!(count_missing(&x), 3);
        assert_eq!(count_missing(&Array2::zeros((2, 2))), 0);
    }
}
