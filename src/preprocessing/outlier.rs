//! Training-row outlier removal
//!
//! Listings with implausible floor areas or prices, and a handful of rows
//! known to be corrupt, are removed from the training table before any
//! statistics are fitted. Test rows never pass through here.

use super::columns::{filter_rows, numeric_values};
use super::config::OutlierConfig;
use crate::error::{AutomlError, Result};
use ndarray::Array1;
use polars::prelude::*;
use std::collections::HashSet;
use tracing::info;

/// Which rows survive the outlier rules, by position
pub fn outlier_mask(df: &DataFrame, target: &Array1<f64>, config: &OutlierConfig) -> Result<Vec<bool>> {
    if df.height() != target.len() {
        return Err(AutomlError::ShapeError {
            expected: format!("target length = {}", df.height()),
            actual: format!("target length = {}", target.len()),
        });
    }

    let sizes = numeric_values(df, "size_sqft")?;
    let bad_rows: HashSet<usize> = config.known_bad_rows.iter().copied().collect();

    let keep = sizes
        .iter()
        .zip(target.iter())
        .enumerate()
        .map(|(i, (size, &y))| {
            // Missing values fail the comparisons and are dropped
            let size_ok = size.map_or(false, |s| s > config.min_size_sqft);
            let target_ok = !y.is_nan() && y > config.min_target && y < config.max_target;
            size_ok && target_ok && !bad_rows.contains(&i)
        })
        .collect();

    Ok(keep)
}

/// Drop outlier rows from the training features and target together
pub fn drop_outliers(
    df: &DataFrame,
    target: &Array1<f64>,
    config: &OutlierConfig,
) -> Result<(DataFrame, Array1<f64>)> {
    let keep = outlier_mask(df, target, config)?;
    let filtered = filter_rows(df, &keep)?;
    let kept_target: Array1<f64> = target
        .iter()
        .zip(keep.iter())
        .filter(|(_, k)| **k)
        .map(|(&y, _)| y)
        .collect();

    info!(
        removed = df.height() - filtered.height(),
        remaining = filtered.height(),
        "Dropped training outliers"
    );

    Ok((filtered, kept_target))
}
