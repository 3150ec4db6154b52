//! Model selection configuration

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How candidates are drawn from the parameter grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Every combination of the grid
    Grid,
    /// `n_iter` distinct combinations drawn with a fixed seed
    Random { n_iter: usize },
}

/// Configuration for cross-validated model selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub strategy: SearchStrategy,

    /// Cross-validation folds
    pub cv_folds: usize,

    /// Seed for random search
    pub random_state: u64,

    /// Worker threads for candidate × fold evaluation; `None` uses the global pool
    pub n_jobs: Option<usize>,

    /// Log every fold score at info level
    pub verbose: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            strategy: SearchStrategy::Grid,
            cv_folds: 10,
            random_state: 42,
            n_jobs: None,
            verbose: false,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to switch to seeded random search
    pub fn with_random_search(mut self, n_iter: usize) -> Self {
        self.strategy = SearchStrategy::Random { n_iter };
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Builder method to bound parallel execution
    pub fn with_n_jobs(mut self, n: usize) -> Self {
        self.n_jobs = Some(n);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Load from a JSON file; absent fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
