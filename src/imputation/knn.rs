//! KNN-based imputation

use crate::error::{AutomlError, Result};
use crate::imputation::{is_missing, Imputer};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

/// Ordered float for priority queue
#[derive(Debug, Clone, Copy)]
struct DistanceIdx(f64, usize);

impl PartialEq for DistanceIdx {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for DistanceIdx {}

impl PartialOrd for DistanceIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DistanceIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max heap by distance (we want to pop largest distances)
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// How neighbour values are averaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NeighborWeights {
    Uniform,
    /// Inverse distance; exact matches take all the weight
    Distance,
}

impl NeighborWeights {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "uniform" => Ok(Self::Uniform),
            "distance" => Ok(Self::Distance),
            other => Err(AutomlError::InvalidParameter {
                name: "weights".to_string(),
                value: other.to_string(),
                reason: "expected 'uniform' or 'distance'".to_string(),
            }),
        }
    }
}

/// NaN-aware euclidean distance.
///
/// Only coordinates present in both rows contribute; the sum is scaled up
/// by `n_features / n_present`. Rows sharing no coordinate are infinitely
/// far apart.
pub fn nan_euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let mut present = 0usize;
    let mut accum = 0.0f64;

    for (&ai, &bi) in a.iter().zip(b.iter()) {
        if is_missing(ai) || is_missing(bi) {
            continue;
        }
        present += 1;
        let d = ai - bi;
        accum += d * d;
    }

    if present == 0 {
        return f64::INFINITY;
    }

    (accum * a.len() as f64 / present as f64).sqrt()
}

/// KNN-based imputer.
///
/// Every training row is kept, including incomplete ones: for each missing
/// cell the donors are the nearest training rows where that feature is
/// present. Cells with no usable donor fall back to the training column
/// mean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNImputer {
    /// Number of neighbors
    n_neighbors: usize,
    weights: NeighborWeights,
    /// Training data, missing cells included
    fit_data: Option<Array2<f64>>,
    /// Feature means for fallback
    feature_means: Option<Array1<f64>>,
}

impl KNNImputer {
    /// Create new KNN imputer
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            weights: NeighborWeights::Uniform,
            fit_data: None,
            feature_means: None,
        }
    }

    /// Set weighting scheme
    pub fn with_weights(mut self, weights: NeighborWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    fn fallback(&self, feature_idx: usize) -> f64 {
        self.feature_means
            .as_ref()
            .map(|m| m[feature_idx])
            .unwrap_or(0.0)
    }

    /// k nearest donors for one feature, given precomputed distances
    fn donors(&self, data: &Array2<f64>, distances: &[f64], feature_idx: usize) -> Vec<(usize, f64)> {
        let k = self.n_neighbors;
        let mut heap: BinaryHeap<DistanceIdx> = BinaryHeap::with_capacity(k + 1);

        for (i, &dist) in distances.iter().enumerate() {
            if !dist.is_finite() || is_missing(data[[i, feature_idx]]) {
                continue;
            }
            if heap.len() < k {
                heap.push(DistanceIdx(dist, i));
            } else if let Some(&DistanceIdx(max_dist, _)) = heap.peek() {
                if dist < max_dist {
                    heap.pop();
                    heap.push(DistanceIdx(dist, i));
                }
            }
        }

        heap.into_iter().map(|DistanceIdx(d, i)| (i, d)).collect()
    }

    /// Impute missing value using neighbors
    fn impute_value(&self, data: &Array2<f64>, neighbors: &[(usize, f64)], feature_idx: usize) -> f64 {
        if neighbors.is_empty() {
            return self.fallback(feature_idx);
        }

        match self.weights {
            NeighborWeights::Distance => {
                let exact: Vec<usize> = neighbors
                    .iter()
                    .filter(|(_, d)| *d == 0.0)
                    .map(|(i, _)| *i)
                    .collect();
                if !exact.is_empty() {
                    let sum: f64 = exact.iter().map(|&i| data[[i, feature_idx]]).sum();
                    return sum / exact.len() as f64;
                }

                let mut weighted_sum = 0.0;
                let mut weight_sum = 0.0;
                for &(idx, dist) in neighbors {
                    let weight = 1.0 / dist;
                    weighted_sum += data[[idx, feature_idx]] * weight;
                    weight_sum += weight;
                }

                if weight_sum > 0.0 {
                    weighted_sum / weight_sum
                } else {
                    self.fallback(feature_idx)
                }
            }
            NeighborWeights::Uniform => {
                let sum: f64 = neighbors.iter().map(|&(idx, _)| data[[idx, feature_idx]]).sum();
                sum / neighbors.len() as f64
            }
        }
    }

    fn impute_row(&self, data: &Array2<f64>, row: ArrayView1<f64>) -> Vec<(usize, f64)> {
        let distances: Vec<f64> = data
            .rows()
            .into_iter()
            .map(|donor| nan_euclidean(row, donor))
            .collect();

        row.iter()
            .enumerate()
            .filter(|&(_, &v)| is_missing(v))
            .map(|(j, _)| {
                let neighbors = self.donors(data, &distances, j);
                (j, self.impute_value(data, &neighbors, j))
            })
            .collect()
    }
}

impl Default for KNNImputer {
    fn default() -> Self {
        Self::new(5)
    }
}

impl Imputer for KNNImputer {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(AutomlError::ValidationError(
                "No rows found for KNN imputation".to_string(),
            ));
        }

        // Columns with no observed value fall back to zero
        let feature_means: Array1<f64> = x
            .axis_iter(Axis(1))
            .map(|col| {
                let present: Vec<f64> = col.iter().copied().filter(|v| !is_missing(*v)).collect();
                if present.is_empty() {
                    0.0
                } else {
                    present.iter().sum::<f64>() / present.len() as f64
                }
            })
            .collect();

        self.fit_data = Some(x.clone());
        self.feature_means = Some(feature_means);

        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let data = self.fit_data.as_ref().ok_or(AutomlError::ModelNotFitted)?;

        if x.ncols() != data.ncols() {
            return Err(AutomlError::ShapeError {
                expected: format!("{} features", data.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let incomplete: Vec<usize> = x
            .rows()
            .into_iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(|&v| is_missing(v)))
            .map(|(i, _)| i)
            .collect();

        let filled: Vec<(usize, Vec<(usize, f64)>)> = incomplete
            .par_iter()
            .map(|&i| (i, self.impute_row(data, x.row(i))))
            .collect();

        let mut result = x.clone();
        for (i, cells) in filled {
            for (j, value) in cells {
                result[[i, j]] = value;
            }
        }

        debug!(rows = incomplete.len(), "KNN imputation filled incomplete rows");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_nan_euclidean_scaling() {
        let a = array![0.0, f64::NAN, 3.0];
        let b = array![0.0, 1.0, 0.0];
        // sqrt(3 / 2 * 9)
        assert!((nan_euclidean(a.view(), b.view()) - (13.5f64).sqrt()).abs() < 1e-12);

        let c = array![f64::NAN, f64::NAN, f64::NAN];
        assert!(nan_euclidean(c.view(), b.view()).is_infinite());
    }

    #[test]
    fn test_knn_imputer_basic() {
        let data = Array2::from_shape_vec(
            (6, 2),
            vec![
                1.0, 10.0,
                2.0, 20.0,
                3.0, 30.0,
                4.0, 40.0,
                f64::NAN, 25.0, // Missing first feature
                2.5, f64::NAN, // Missing second feature
            ],
        )
        .unwrap();

        let mut imputer = KNNImputer::new(3);
        let result = imputer.fit_transform(&data).unwrap();

        // Check no NaN values remain
        assert!(!result.iter().any(|&v| v.is_nan()));

        assert!(result[[4, 0]] >= 1.0 && result[[4, 0]] <= 4.0);
        assert!(result[[5, 1]] >= 10.0 && result[[5, 1]] <= 40.0);
    }

    #[test]
    fn test_incomplete_rows_are_donors() {
        // Only row 1 has the third feature, and it is incomplete itself
        let data = array![
            [0.0, 0.0, f64::NAN],
            [0.0, f64::NAN, 7.0],
            [5.0, 5.0, f64::NAN],
        ];

        let mut imputer = KNNImputer::new(1);
        let result = imputer.fit_transform(&data).unwrap();
        assert_eq!(result[[0, 2]], 7.0);
        assert_eq!(result[[2, 2]], 7.0);
    }

    #[test]
    fn test_knn_imputer_distance_weights() {
        let data = array![
            [0.0, 0.0],
            [1.0, 1.0],
            [2.0, 2.0],
            [3.0, 3.0],
            [0.1, f64::NAN], // Very close to first row
        ];

        let mut imputer = KNNImputer::new(3).with_weights(NeighborWeights::Distance);
        let result = imputer.fit_transform(&data).unwrap();

        assert!(result[[4, 1]].abs() < 1.0);
    }

    #[test]
    fn test_exact_match_takes_all_weight() {
        let train = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        let mut imputer = KNNImputer::new(3).with_weights(NeighborWeights::Distance);
        imputer.fit(&train).unwrap();

        let test = array![[2.0, f64::NAN]];
        let result = imputer.transform(&test).unwrap();
        assert_eq!(result[[0, 1]], 20.0);
    }

    #[test]
    fn test_mean_fallback_without_donors() {
        let train = array![[1.0, f64::NAN], [f64::NAN, 4.0], [3.0, 8.0]];
        let mut imputer = KNNImputer::new(2);
        imputer.fit(&train).unwrap();

        // Shares no coordinate with any donor for the first feature
        let test = array![[f64::NAN, f64::NAN]];
        let result = imputer.transform(&test).unwrap();
        assert_eq!(result[[0, 0]], 2.0);
        assert_eq!(result[[0, 1]], 6.0);
    }

    #[test]
    fn test_transform_requires_fit() {
        let imputer = KNNImputer::new(3);
        assert!(matches!(
            imputer.transform(&array![[1.0]]),
            Err(AutomlError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_weights_from_name() {
        assert_eq!(NeighborWeights::from_name("Distance").unwrap(), NeighborWeights::Distance);
        assert!(NeighborWeights::from_name("cosine").is_err());
    }
}
