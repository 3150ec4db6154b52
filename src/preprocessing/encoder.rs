//! Categorical encoding implementations

use super::columns::{drop_columns, has_column, numeric_values, set_numeric, string_values};
use crate::error::{AutomlError, Result};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Code given to a value that was never seen while fitting
pub const UNSEEN_CODE: i64 = -1;

/// Bijection between observed labels and integer codes.
///
/// Observed labels are sorted and coded `0..n-1`; missing values take
/// code `n`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryMapping {
    labels: Vec<String>,
}

impl CategoryMapping {
    /// Build a mapping from the observed values of a column
    pub fn fit(values: &[Option<String>]) -> Self {
        let mut labels: Vec<String> = values.iter().flatten().cloned().collect();
        labels.sort();
        labels.dedup();
        Self { labels }
    }

    /// Number of observed labels (the missing sentinel excluded)
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn missing_code(&self) -> i64 {
        self.labels.len() as i64
    }

    pub fn code(&self, value: Option<&str>) -> i64 {
        match value {
            None => self.missing_code(),
            Some(v) => self
                .labels
                .binary_search_by(|probe| probe.as_str().cmp(v))
                .map(|i| i as i64)
                .unwrap_or(UNSEEN_CODE),
        }
    }

    /// Label for a code; `None` for the missing sentinel and unknown codes
    pub fn label(&self, code: i64) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.labels.get(i))
            .map(|s| s.as_str())
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Label encoder over several columns, fitted once on training data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryEncoder {
    mappings: BTreeMap<String, CategoryMapping>,
    is_fitted: bool,
}

impl CategoryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit a mapping for each listed column present in the frame
    pub fn fit<S: AsRef<str>>(&mut self, df: &DataFrame, columns: &[S]) -> Result<&mut Self> {
        for name in columns {
            let name = name.as_ref();
            if !has_column(df, name) {
                debug!(column = %name, "Categorical column absent, not encoded");
                continue;
            }
            let mapping = CategoryMapping::fit(&string_values(df, name)?);
            debug!(column = %name, categories = mapping.len(), "Fitted category mapping");
            self.mappings.insert(name.to_string(), mapping);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace each mapped column with its integer codes.
    /// Returns the number of unseen values encountered.
    pub fn transform(&self, df: &mut DataFrame) -> Result<usize> {
        if !self.is_fitted {
            return Err(AutomlError::ModelNotFitted);
        }

        let mut unseen_total = 0usize;
        for (name, mapping) in &self.mappings {
            let values = string_values(df, name)?;
            let codes: Vec<Option<f64>> = values
                .iter()
                .map(|v| Some(mapping.code(v.as_deref()) as f64))
                .collect();

            let unseen = codes
                .iter()
                .filter(|c| **c == Some(UNSEEN_CODE as f64))
                .count();
            if unseen > 0 {
                warn!(column = %name, rows = unseen, "Unseen categories encoded as {}", UNSEEN_CODE);
            }
            unseen_total += unseen;

            set_numeric(df, name, codes)?;
        }

        Ok(unseen_total)
    }

    pub fn mapping(&self, column: &str) -> Option<&CategoryMapping> {
        self.mappings.get(column)
    }

    pub fn mappings(&self) -> &BTreeMap<String, CategoryMapping> {
        &self.mappings
    }
}

/// Indicator column name for a mapping entry
pub fn indicator_name(column: &str, label: Option<&str>) -> String {
    match label {
        Some(label) => format!("{}_{}", column, label),
        None => format!("{}_missing", column),
    }
}

/// Replace a coded column with one indicator column per mapping entry.
///
/// Indicators follow mapping order with the missing sentinel last. Unseen
/// codes produce all-zero indicators.
pub fn expand_one_hot(df: &mut DataFrame, column: &str, mapping: &CategoryMapping) -> Result<()> {
    let codes = numeric_values(df, column)?;

    for code in 0..=mapping.missing_code() {
        let name = indicator_name(column, mapping.label(code));
        let values: Vec<Option<f64>> = codes
            .iter()
            .map(|c| Some(if *c == Some(code as f64) { 1.0 } else { 0.0 }))
            .collect();
        set_numeric(df, &name, values)?;
    }

    drop_columns(df, &[column])
}

/// Mean-target encoding keyed by category code
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetEncoder {
    means: BTreeMap<String, BTreeMap<i64, f64>>,
    global_mean: f64,
    is_fitted: bool,
}

impl TargetEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the per-code target means for each listed column present
    pub fn fit<S: AsRef<str>>(
        &mut self,
        df: &DataFrame,
        columns: &[S],
        target: &Array1<f64>,
    ) -> Result<&mut Self> {
        if df.height() != target.len() {
            return Err(AutomlError::ShapeError {
                expected: format!("target length = {}", df.height()),
                actual: format!("target length = {}", target.len()),
            });
        }
        if target.is_empty() {
            return Err(AutomlError::DataError("Cannot target-encode an empty table".to_string()));
        }

        self.global_mean = target.mean().unwrap_or(0.0);

        for name in columns {
            let name = name.as_ref();
            if !has_column(df, name) {
                continue;
            }

            let mut sums: HashMap<i64, (f64, usize)> = HashMap::new();
            for (code, &y) in numeric_values(df, name)?.into_iter().zip(target.iter()) {
                if let Some(code) = code {
                    let entry = sums.entry(code as i64).or_insert((0.0, 0));
                    entry.0 += y;
                    entry.1 += 1;
                }
            }

            let means = sums
                .into_iter()
                .map(|(code, (sum, count))| (code, sum / count as f64))
                .collect();
            self.means.insert(name.to_string(), means);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace codes by their training target mean; codes never seen in
    /// training map to the global mean
    pub fn transform(&self, df: &mut DataFrame) -> Result<()> {
        if !self.is_fitted {
            return Err(AutomlError::ModelNotFitted);
        }

        for (name, means) in &self.means {
            let encoded: Vec<Option<f64>> = numeric_values(df, name)?
                .into_iter()
                .map(|code| {
                    let mean = code
                        .and_then(|c| means.get(&(c as i64)).copied())
                        .unwrap_or(self.global_mean);
                    Some(mean)
                })
                .collect();
            set_numeric(df, name, encoded)?;
        }
        Ok(())
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    pub fn means(&self, column: &str) -> Option<&BTreeMap<i64, f64>> {
        self.means.get(column)
    }
}
