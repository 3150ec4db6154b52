//! K-fold cross-validation splits

use crate::error::{AutomlError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A single train/validation split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// K-fold splitter.
///
/// Folds are contiguous blocks in row order, the first
/// `n_samples % n_splits` folds holding one extra row. A shuffle seed
/// permutes the rows first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KFold {
    pub n_splits: usize,
    pub shuffle_seed: Option<u64>,
}

impl Default for KFold {
    fn default() -> Self {
        Self::new(10)
    }
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle_seed: None,
        }
    }

    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    /// Row indices for every fold, in fold order
    pub fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        let n_splits = self.n_splits;
        if n_splits < 2 {
            return Err(AutomlError::InvalidParameter {
                name: "cv_folds".to_string(),
                value: n_splits.to_string(),
                reason: "cross-validation needs at least 2 folds".to_string(),
            });
        }
        if n_samples < n_splits {
            return Err(AutomlError::ValidationError(format!(
                "{} training rows cannot fill {} folds",
                n_samples, n_splits
            )));
        }

        let mut rows: Vec<usize> = (0..n_samples).collect();
        if let Some(seed) = self.shuffle_seed {
            rows.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
        }

        let (base, remainder) = (n_samples / n_splits, n_samples % n_splits);
        let mut start = 0;
        Ok((0..n_splits)
            .map(|fold_idx| {
                let end = start + base + usize::from(fold_idx < remainder);
                let split = CVSplit {
                    train_indices: rows[..start].iter().chain(&rows[end..]).copied().collect(),
                    test_indices: rows[start..end].to_vec(),
                    fold_idx,
                };
                start = end;
                split
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_folds_cover_every_row() {
        let splits = KFold::new(5).split(100).unwrap();
        assert_eq!(splits.len(), 5);

        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_contiguous_uneven_folds() {
        let splits = KFold::new(3).split(10).unwrap();
        assert_eq!(splits[0].test_indices, vec![0, 1, 2, 3]);
        assert_eq!(splits[1].test_indices, vec![4, 5, 6]);
        assert_eq!(splits[2].test_indices, vec![7, 8, 9]);
        assert_eq!(splits[1].train_indices, vec![0, 1, 2, 3, 7, 8, 9]);
    }

    #[test]
    fn test_shuffled_folds_are_seeded() {
        let a = KFold::new(4).with_shuffle(9).split(20).unwrap();
        let b = KFold::new(4).with_shuffle(9).split(20).unwrap();
        assert_eq!(a, b);
        assert_ne!(a[0].test_indices, (0..5).collect::<Vec<_>>());
    }

    #[test]
    fn test_invalid_fold_counts() {
        assert!(KFold::new(1).split(10).is_err());
        assert!(KFold::new(10).split(5).is_err());
    }
}
