//! Hyperparameter grids and candidate generation

use crate::error::{AutomlError, Result};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Prefix addressing the wrapped estimator inside the target transformer
pub const REGRESSOR_PREFIX: &str = "regressor__";

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Unset, e.g. an unbounded tree depth
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    IntList(Vec<i64>),
}

impl ParamValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int; floats must be whole numbers
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ParamValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as a list of ints; a single int is a one-element list
    pub fn as_int_list(&self) -> Option<Vec<i64>> {
        match self {
            ParamValue::IntList(v) => Some(v.clone()),
            ParamValue::Int(v) => Some(vec![*v]),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => write!(f, "None"),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::String(v) => write!(f, "{}", v),
            ParamValue::IntList(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

impl From<Vec<i64>> for ParamValue {
    fn from(v: Vec<i64>) -> Self {
        ParamValue::IntList(v)
    }
}

/// One concrete hyperparameter setting
pub type HyperParams = BTreeMap<String, ParamValue>;

/// Parameter name to candidate values; names iterate in sorted order
pub type ParamGrid = BTreeMap<String, Vec<ParamValue>>;

/// Remove the optional `regressor__` prefix from a parameter name
pub fn strip_regressor_prefix(name: &str) -> &str {
    name.strip_prefix(REGRESSOR_PREFIX).unwrap_or(name)
}

/// Build a grid from `(name, values)` pairs
pub fn param_grid<I, S>(entries: I) -> ParamGrid
where
    I: IntoIterator<Item = (S, Vec<ParamValue>)>,
    S: Into<String>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Number of candidates the full grid expands to
pub fn grid_size(grid: &ParamGrid) -> usize {
    grid.values().map(|v| v.len()).product()
}

/// Every combination of the grid, the last name varying fastest.
///
/// An empty grid yields a single empty setting.
pub fn grid_candidates(grid: &ParamGrid) -> Result<Vec<HyperParams>> {
    if let Some((name, _)) = grid.iter().find(|(_, values)| values.is_empty()) {
        return Err(AutomlError::InvalidParameter {
            name: name.clone(),
            value: "[]".to_string(),
            reason: "parameter grid entries need at least one value".to_string(),
        });
    }

    let mut candidates: Vec<HyperParams> = vec![HyperParams::new()];
    for (name, values) in grid {
        candidates = candidates
            .into_iter()
            .flat_map(|partial| {
                values.iter().map(move |value| {
                    let mut next = partial.clone();
                    next.insert(name.clone(), value.clone());
                    next
                })
            })
            .collect();
    }

    Ok(candidates)
}

/// `n_iter` distinct candidates drawn without replacement from the grid.
///
/// Asking for at least as many candidates as the grid holds returns the
/// whole grid in order.
pub fn sample_candidates(grid: &ParamGrid, n_iter: usize, seed: u64) -> Result<Vec<HyperParams>> {
    let all = grid_candidates(grid)?;
    if n_iter >= all.len() {
        return Ok(all);
    }
    if n_iter == 0 {
        return Err(AutomlError::InvalidParameter {
            name: "n_iter".to_string(),
            value: "0".to_string(),
            reason: "random search needs at least one candidate".to_string(),
        });
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let picked = sample(&mut rng, all.len(), n_iter);
    Ok(picked.into_iter().map(|i| all[i].clone()).collect())
}
