//! Data loading and output utilities

use crate::error::{AutomlError, Result};
use crate::optimizer::SearchReport;
use crate::preprocessing::columns::numeric_values;
use ndarray::Array1;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

/// Rows scanned when inferring CSV column types
const INFER_SCHEMA_ROWS: usize = 10_000;

/// Load a CSV file with a header row
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| AutomlError::DataError(format!("{}: {}", path.display(), e)))?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| AutomlError::DataError(format!("{}: {}", path.display(), e)))?;

    let df = blank_columns_as_float(df)?;
    debug!(path = %path.display(), rows = df.height(), columns = df.width(), "Loaded CSV");
    Ok(df)
}

/// Columns with no values at all come back from type inference as text;
/// read them as numeric so they reach imputation as missing numbers.
fn blank_columns_as_float(mut df: DataFrame) -> Result<DataFrame> {
    if df.height() == 0 {
        return Ok(df);
    }
    let blank: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| matches!(c.dtype(), DataType::String) && c.null_count() == c.len())
        .map(|c| c.name().to_string())
        .collect();

    for name in &blank {
        let cast = df.column(name)?.cast(&DataType::Float64)?;
        df.with_column(cast)?;
        debug!(column = %name, "Blank text column read as numeric");
    }
    Ok(df)
}

/// Detect file format from extension and load; unknown extensions are read as CSV
pub fn load_table(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "parquet" | "pq" => {
            let file = File::open(path)?;
            ParquetReader::new(file)
                .finish()
                .map_err(|e| AutomlError::DataError(format!("{}: {}", path.display(), e)))
        }
        "json" | "jsonl" => {
            let file = File::open(path)?;
            let format = if extension == "jsonl" { JsonFormat::JsonLines } else { JsonFormat::Json };
            JsonReader::new(file)
                .with_json_format(format)
                .finish()
                .map_err(|e| AutomlError::DataError(format!("{}: {}", path.display(), e)))
        }
        _ => load_csv(path),
    }
}

/// Read a CSV and split off `target` as a float vector when named.
///
/// Blank targets become NaN; training-row outlier removal drops them.
pub fn read_csv(path: impl AsRef<Path>, target: Option<&str>) -> Result<(DataFrame, Option<Array1<f64>>)> {
    let mut df = load_csv(path)?;
    let Some(target) = target else {
        return Ok((df, None));
    };

    let values = numeric_values(&df, target)?;
    let missing = values.iter().filter(|v| v.is_none()).count();
    if missing > 0 {
        warn!(column = %target, rows = missing, "Training rows without a target");
    }
    let y: Array1<f64> = values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
    df.drop_in_place(target)?;

    Ok((df, Some(y)))
}

/// Write a DataFrame as CSV with a header row
pub fn write_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .map_err(|e| AutomlError::DataError(format!("{}: {}", path.display(), e)))?;
    debug!(path = %path.display(), rows = df.height(), "Wrote CSV");
    Ok(())
}

/// Write predictions as `Id,Predicted`, ids counting from zero
pub fn write_submission(path: impl AsRef<Path>, predictions: &Array1<f64>) -> Result<()> {
    let ids: Vec<u64> = (0..predictions.len() as u64).collect();
    let mut df = df! {
        "Id" => ids,
        "Predicted" => predictions.to_vec(),
    }?;
    write_csv(&mut df, path.as_ref())?;
    info!(path = %path.as_ref().display(), rows = predictions.len(), "Wrote submission");
    Ok(())
}

/// Write a search report as pretty JSON
pub fn write_report(path: impl AsRef<Path>, report: &SearchReport) -> Result<()> {
    report.save(path.as_ref())?;
    info!(path = %path.as_ref().display(), "Wrote search report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_read_csv_splits_target() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "size_sqft,num_beds,price").unwrap();
        writeln!(file, "800,2,1000000").unwrap();
        writeln!(file, "1200,3,1500000.5").unwrap();

        let (df, y) = read_csv(&path, Some("price")).unwrap();
        assert_eq!(df.width(), 2);
        assert_eq!(y.unwrap().to_vec(), vec![1_000_000.0, 1_500_000.5]);

        let (df, y) = read_csv(&path, None).unwrap();
        assert_eq!(df.width(), 3);
        assert!(y.is_none());
    }

    #[test]
    fn test_blank_target_is_nan() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(&path, "size_sqft,price\n800,1000000\n900,\n").unwrap();

        let (_, y) = read_csv(&path, Some("price")).unwrap();
        let y = y.unwrap();
        assert_eq!(y[0], 1_000_000.0);
        assert!(y[1].is_nan());
    }

    #[test]
    fn test_blank_column_loads_as_float() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.csv");
        std::fs::write(&path, "size_sqft,built_year,tenure\n800,,freehold\n900,,\n").unwrap();

        let df = load_csv(&path).unwrap();
        assert_eq!(df.column("built_year").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("built_year").unwrap().null_count(), 2);
        assert_eq!(df.column("tenure").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_missing_target_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        assert!(read_csv(&path, Some("price")).is_err());
        assert!(read_csv(dir.path().join("absent.csv"), None).is_err());
    }

    #[test]
    fn test_write_submission() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("submission.csv");
        write_submission(&path, &Array1::from_vec(vec![1.5, 2.25])).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Id,Predicted");
        assert_eq!(lines[1], "0,1.5");
        assert_eq!(lines[2], "1,2.25");
    }
}
