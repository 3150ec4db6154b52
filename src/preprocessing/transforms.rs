//! Text normalization and derived listing fields
//!
//! Raw listing text is noisy: mixed case, several spellings of the same
//! furnishing or property type, and free-form floor-level and tenure
//! descriptions. These helpers rewrite string columns in place.

use super::columns::{drop_columns, has_column, numeric_values, set_numeric, set_strings, string_columns, string_values};
use crate::error::Result;
use polars::prelude::*;
use regex::Regex;
use tracing::debug;

/// Lowercase every string column
pub fn lowercase_strings(df: &mut DataFrame) -> Result<()> {
    for name in string_columns(df) {
        let values = string_values(df, &name)?
            .into_iter()
            .map(|v| v.map(|s| s.to_lowercase()))
            .collect();
        set_strings(df, &name, values)?;
    }
    Ok(())
}

/// Replace exact occurrences of `from` with `to` in a string column
pub fn replace_value(df: &mut DataFrame, column: &str, from: &str, to: &str) -> Result<()> {
    let values = string_values(df, column)?
        .into_iter()
        .map(|v| v.map(|s| if s == from { to.to_string() } else { s }))
        .collect();
    set_strings(df, column, values)
}

/// Replace every regex match inside a string column
pub fn replace_pattern(df: &mut DataFrame, column: &str, pattern: &Regex, to: &str) -> Result<()> {
    let values = string_values(df, column)?
        .into_iter()
        .map(|v| v.map(|s| pattern.replace_all(&s, to).into_owned()))
        .collect();
    set_strings(df, column, values)
}

/// Canonicalize furnishing and property-type spellings
pub fn normalize_listing_text(df: &mut DataFrame) -> Result<()> {
    lowercase_strings(df)?;

    // "na" here means the agent left it blank
    replace_value(df, "furnishing", "na", "unspecified")?;

    let hdb = Regex::new(r"hdb.*")?;
    replace_pattern(df, "property_type", &hdb, "hdb")?;
    Ok(())
}

/// Drop columns that carry no usable signal
pub fn drop_unused_columns(df: &mut DataFrame, columns: &[String]) -> Result<()> {
    for name in columns {
        if !has_column(df, name) {
            debug!(column = %name, "Column already absent, skipping drop");
        }
    }
    drop_columns(df, columns)
}

/// Drop intermediate columns once encoding and imputation are done
pub fn drop_residual_columns(df: &mut DataFrame, residual: &[String]) -> Result<()> {
    let mut names: Vec<String> = df
        .get_columns()
        .iter()
        .map(|c| c.name().to_string())
        .filter(|name| name.contains("floor_level"))
        .collect();
    names.extend(residual.iter().cloned());
    drop_columns(df, &names)
}

/// Reduce a raw floor description such as `"high (70 total)"` to `"high"`
pub fn clean_floor_level(raw: &str) -> Option<String> {
    raw.split(|c: char| !c.is_alphabetic())
        .find(|word| !word.is_empty())
        .map(|word| word.to_string())
}

/// Collapse tenure variants.
///
/// Leases of 900 years or more count as freehold; leases between 90 and
/// 899 years are grouped with the standard 99-year lease.
pub fn clean_tenure(raw: &str) -> String {
    if raw.contains("freehold") {
        return "freehold".to_string();
    }

    let years = raw
        .split(|c: char| !c.is_ascii_digit())
        .find(|part| !part.is_empty())
        .and_then(|part| part.parse::<u32>().ok());

    match years {
        Some(y) if y >= 900 => "freehold".to_string(),
        Some(y) if y >= 90 => "99-year leasehold".to_string(),
        _ => raw.to_string(),
    }
}

/// Rewrite `floor_level` into its cleaned category
pub fn extract_floor_level(df: &mut DataFrame) -> Result<()> {
    if !has_column(df, "floor_level") {
        return Ok(());
    }
    let values = string_values(df, "floor_level")?
        .into_iter()
        .map(|v| v.and_then(|s| clean_floor_level(&s)))
        .collect();
    set_strings(df, "floor_level", values)
}

/// Rewrite `tenure` into its cleaned category
pub fn extract_tenure(df: &mut DataFrame) -> Result<()> {
    if !has_column(df, "tenure") {
        return Ok(());
    }
    let values = string_values(df, "tenure")?
        .into_iter()
        .map(|v| v.map(|s| clean_tenure(&s)))
        .collect();
    set_strings(df, "tenure", values)
}

/// Round the named numeric columns up to the nearest integer
pub fn round_up_columns(df: &mut DataFrame, columns: &[String]) -> Result<()> {
    for name in columns {
        let values = numeric_values(df, name)?
            .into_iter()
            .map(|v| v.map(f64::ceil))
            .collect();
        set_numeric(df, name, values)?;
    }
    Ok(())
}
