//! Column access helpers over polars data frames
//!
//! Every pipeline step reads a column into plain Rust vectors, rewrites it,
//! and puts it back. Missing values are `None` on the way out and nulls on
//! the way in; NaN is treated as missing when reading numeric columns.

use crate::error::{AutomlError, Result};
use ndarray::Array2;
use polars::prelude::*;

/// Names of all columns, in frame order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns().iter().map(|c| c.name().to_string()).collect()
}

/// Whether the frame contains a column with this name
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_columns().iter().any(|c| c.name().as_str() == name)
}

/// Names of all string-typed columns
pub fn string_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| matches!(c.dtype(), DataType::String))
        .map(|c| c.name().to_string())
        .collect()
}

/// Whether the named column holds integers or floats
pub fn is_numeric_column(df: &DataFrame, name: &str) -> bool {
    df.column(name)
        .map(|c| {
            matches!(
                c.dtype(),
                DataType::Float64
                    | DataType::Float32
                    | DataType::Int64
                    | DataType::Int32
                    | DataType::Int16
                    | DataType::Int8
                    | DataType::UInt64
                    | DataType::UInt32
                    | DataType::UInt16
                    | DataType::UInt8
            )
        })
        .unwrap_or(false)
}

/// Read a string column; non-string columns are cast to text
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| AutomlError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series();
    let series = if matches!(series.dtype(), DataType::String) {
        series.clone()
    } else {
        series.cast(&DataType::String)?
    };
    let ca = series.str()?;
    Ok(ca.into_iter().map(|v| v.map(|s| s.to_string())).collect())
}

/// Read a numeric column as `f64`
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| AutomlError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    let ca = series.f64()?;
    Ok(ca.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect())
}

/// Insert or replace a string column
pub fn set_strings(df: &mut DataFrame, name: &str, values: Vec<Option<String>>) -> Result<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

/// Insert or replace a numeric column
pub fn set_numeric(df: &mut DataFrame, name: &str, values: Vec<Option<f64>>) -> Result<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

/// Drop the named columns that exist; absent names are ignored
pub fn drop_columns<S: AsRef<str>>(df: &mut DataFrame, names: &[S]) -> Result<()> {
    for name in names {
        let name = name.as_ref();
        if has_column(df, name) {
            df.drop_in_place(name)?;
        }
    }
    Ok(())
}

/// Keep only the rows flagged `true`
pub fn filter_rows(df: &DataFrame, keep: &[bool]) -> Result<DataFrame> {
    if keep.len() != df.height() {
        return Err(AutomlError::ShapeError {
            expected: format!("mask length = {}", df.height()),
            actual: format!("mask length = {}", keep.len()),
        });
    }
    let mask = BooleanChunked::from_slice("keep".into(), keep);
    Ok(df.filter(&mask)?)
}

/// Copy the frame into a dense matrix; missing values become NaN.
///
/// Fails on string columns: everything must be encoded before this point.
pub fn to_matrix(df: &DataFrame) -> Result<(Array2<f64>, Vec<String>)> {
    let names = column_names(df);
    // All-null text columns are just missing numbers
    let text = string_columns(df)
        .into_iter()
        .find(|name| df.column(name).map_or(false, |c| c.null_count() < c.len()));
    if let Some(name) = text {
        return Err(AutomlError::PreprocessingError(format!(
            "column '{}' is still non-numeric",
            name
        )));
    }

    let mut matrix = Array2::from_elem((df.height(), names.len()), f64::NAN);
    for (j, name) in names.iter().enumerate() {
        for (i, value) in numeric_values(df, name)?.into_iter().enumerate() {
            if let Some(v) = value {
                matrix[[i, j]] = v;
            }
        }
    }

    Ok((matrix, names))
}

/// Build a frame from a dense matrix and its column names; NaN becomes null
pub fn from_matrix(matrix: &Array2<f64>, names: &[String]) -> Result<DataFrame> {
    if matrix.ncols() != names.len() {
        return Err(AutomlError::ShapeError {
            expected: format!("{} columns", names.len()),
            actual: format!("{} columns", matrix.ncols()),
        });
    }

    let columns: Vec<Column> = names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let values: Vec<Option<f64>> = matrix
                .column(j)
                .iter()
                .map(|&v| if v.is_nan() { None } else { Some(v) })
                .collect();
            Series::new(name.as_str().into(), values).into()
        })
        .collect();

    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df!(
            "a" => &[Some(1.0), None, Some(3.0)],
            "b" => &[Some("x"), Some("y"), None],
        )
        .unwrap()
    }

    #[test]
    fn test_read_values() {
        let df = frame();
        assert_eq!(numeric_values(&df, "a").unwrap(), vec![Some(1.0), None, Some(3.0)]);
        assert_eq!(
            string_values(&df, "b").unwrap(),
            vec![Some("x".to_string()), Some("y".to_string()), None]
        );
        assert!(matches!(
            numeric_values(&df, "missing"),
            Err(AutomlError::FeatureNotFound(_))
        ));
    }

    #[test]
    fn test_drop_and_filter() {
        let mut df = frame();
        drop_columns(&mut df, &["b", "not_there"]).unwrap();
        assert_eq!(column_names(&df), vec!["a".to_string()]);

        let filtered = filter_rows(&df, &[true, false, true]).unwrap();
        assert_eq!(filtered.height(), 2);
    }

    #[test]
    fn test_matrix_conversion() {
        let mut df = frame();
        drop_columns(&mut df, &["b"]).unwrap();
        let (matrix, names) = to_matrix(&df).unwrap();
        assert_eq!(matrix.dim(), (3, 1));
        assert!(matrix[[1, 0]].is_nan());

        let back = from_matrix(&matrix, &names).unwrap();
        assert_eq!(numeric_values(&back, "a").unwrap(), vec![Some(1.0), None, Some(3.0)]);
    }

    #[test]
    fn test_matrix_rejects_strings() {
        assert!(to_matrix(&frame()).is_err());
    }

    #[test]
    fn test_matrix_reads_blank_text_column_as_missing() {
        let df = df!(
            "size_sqft" => &[800.0, 900.0],
            "built_year" => &[None::<&str>, None],
        )
        .unwrap();
        let (matrix, _) = to_matrix(&df).unwrap();
        assert_eq!(matrix[[1, 0]], 900.0);
        assert!(matrix.column(1).iter().all(|v| v.is_nan()));
    }
}
