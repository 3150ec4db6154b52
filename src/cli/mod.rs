//! Housing AutoML CLI Module
//!
//! Command-line interface for training, preprocessing and data inspection.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::optimizer::{GridSearchRegressor, ParamGrid, SearchConfig};
use crate::preprocessing::{AuxiliaryData, FeaturePipeline, PipelineConfig, ProcessedData};
use crate::training::{large_error_outliers, ModelKind, Regressor, LARGE_ERROR_THRESHOLD};
use crate::utils::{load_table, read_csv, write_csv, write_report, write_submission};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "housing-automl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Feature pipeline and cross-validated model selection for housing prices")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Inputs shared by every command that runs the feature pipeline
#[derive(clap::Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Training CSV, including the target column
    #[arg(long)]
    pub train: PathBuf,

    /// Test CSV, without the target column
    #[arg(long)]
    pub test: PathBuf,

    /// Target column name
    #[arg(short, long, default_value = "price")]
    pub target: String,

    /// Pipeline configuration (JSON); absent fields keep their defaults
    #[arg(long)]
    pub pipeline_config: Option<PathBuf>,

    /// Infrastructure point table as NAME=PATH (CSV, JSON or Parquet with lat/lng), repeatable
    #[arg(long = "infrastructure", value_name = "NAME=PATH")]
    pub infrastructure: Vec<String>,

    /// Subzone attribute table (CSV, JSON or Parquet)
    #[arg(long)]
    pub subzones: Option<PathBuf>,

    /// Key column of the subzone table
    #[arg(long, default_value = "name")]
    pub subzone_key: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline, search hyperparameters and write test predictions
    Train {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Model (ridge, lasso, decision_tree, random_forest, gradient_boosting, mlp)
        #[arg(short, long, default_value = "random_forest")]
        model: String,

        /// Parameter grid (JSON object of name → list of values); defaults to the model's grid
        #[arg(long)]
        grid: Option<PathBuf>,

        /// Search configuration (JSON)
        #[arg(long)]
        search_config: Option<PathBuf>,

        /// Number of cross-validation folds
        #[arg(long)]
        cv_folds: Option<usize>,

        /// Sample this many candidates instead of the full grid
        #[arg(long)]
        n_iter: Option<usize>,

        /// Output submission file
        #[arg(short, long, default_value = "submission.csv")]
        output: PathBuf,

        /// Write the search report (JSON) here
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run the pipeline and write the processed tables
    Preprocess {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Output directory for processed_train.csv and processed_test.csv
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Show data information
    Info {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,
    },
}

// ─── Shared steps ──────────────────────────────────────────────────────────────

fn load_auxiliary(args: &PipelineArgs) -> anyhow::Result<AuxiliaryData> {
    let mut auxiliary = AuxiliaryData::new().with_subzone_key(args.subzone_key.clone());

    for spec in &args.infrastructure {
        let (name, path) = spec
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected NAME=PATH, got '{}'", spec))?;
        let table = load_table(path)?;
        auxiliary = auxiliary.with_infrastructure(name, table);
    }
    if let Some(path) = &args.subzones {
        auxiliary = auxiliary.with_subzones(load_table(path)?);
    }

    Ok(auxiliary)
}

fn run_pipeline(args: &PipelineArgs) -> anyhow::Result<ProcessedData> {
    step_run("Loading data");
    let start = Instant::now();
    let (train_x, train_y) = read_csv(&args.train, Some(args.target.as_str()))?;
    let train_y = train_y.ok_or_else(|| anyhow::anyhow!("Target column '{}' was not loaded", args.target))?;
    let (test_x, _) = read_csv(&args.test, None)?;
    step_done(&format!(
        "{} train rows, {} test rows in {:?}",
        train_x.height(),
        test_x.height(),
        start.elapsed()
    ));

    let config = match &args.pipeline_config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    let auxiliary = load_auxiliary(args)?;

    step_run("Preprocessing");
    let start = Instant::now();
    let processed = FeaturePipeline::new(config)
        .with_auxiliary(auxiliary)
        .run(&train_x, &train_y, &test_x)?;
    step_done(&format!(
        "{} rows × {} features in {:?}",
        processed.train.height(),
        processed.train.width(),
        start.elapsed()
    ));

    Ok(processed)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub fn cmd_train(
    pipeline: &PipelineArgs,
    model: &str,
    grid_path: Option<&Path>,
    search_config_path: Option<&Path>,
    cv_folds: Option<usize>,
    n_iter: Option<usize>,
    output: &Path,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");

    let kind = ModelKind::from_name(model)?;
    let grid: ParamGrid = match grid_path {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => kind.default_grid(),
    };
    let mut search_config = match search_config_path {
        Some(path) => SearchConfig::from_json_file(path)?,
        None => SearchConfig::default(),
    };
    if let Some(folds) = cv_folds {
        search_config = search_config.with_cv_folds(folds);
    }
    if let Some(n) = n_iter {
        search_config = search_config.with_random_search(n);
    }

    let processed = run_pipeline(pipeline)?;
    let (x, feature_names) = processed.train_matrix()?;
    let x_test = processed.test_matrix()?;

    step_run(&format!("Searching {}", kind.name().cyan()));
    let start = Instant::now();
    let folds = search_config.cv_folds;
    let mut search = GridSearchRegressor::new(kind.name(), kind.default_estimator(), grid, folds)
        .with_config(search_config);
    let best = search.fit(&x, &processed.target, &feature_names, report_path.is_some())?;
    step_done(&format!("{:?}", start.elapsed()));

    let results = search
        .cv_results()
        .ok_or_else(|| anyhow::anyhow!("Search finished without results"))?;
    let best_index = results.best_index()?;
    let (train_rmse, validation_rmse) = results.fold_rmse(best_index);
    let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;

    let train_pred = best.predict(&x)?;
    let flagged = large_error_outliers(&train_pred, &processed.target, LARGE_ERROR_THRESHOLD)?;

    step_run("Predicting test set");
    let predictions = best.predict(&x_test)?;
    write_submission(output, &predictions)?;
    step_done(&format!("{} rows → {}", predictions.len(), output.display()));

    if let (Some(path), Some(report)) = (report_path, search.report()) {
        write_report(path, report)?;
    }

    println!();
    kv("Candidates", &results.n_candidates().to_string());
    kv("Best parameters", &serde_json::to_string(&results.params[best_index])?);
    kv("Train RMSE", &format!("{:.4}", mean(train_rmse.as_slice())));
    kv("Validation RMSE", &format!("{:.4}", mean(validation_rmse.as_slice())));
    if !flagged.is_empty() {
        println!("  {} {} training rows with very large errors", "!".yellow(), flagged.len());
    }
    println!();

    Ok(())
}

pub fn cmd_preprocess(pipeline: &PipelineArgs, output_dir: &Path) -> anyhow::Result<()> {
    section("Preprocess");

    let mut processed = run_pipeline(pipeline)?;
    std::fs::create_dir_all(output_dir)?;

    let train_path = output_dir.join("processed_train.csv");
    let test_path = output_dir.join("processed_test.csv");

    step_run(&format!("Saving → {}", output_dir.display()));
    let target = Column::new(pipeline.target.as_str().into(), processed.target.to_vec());
    let mut train = processed.train.clone();
    train.with_column(target)?;
    write_csv(&mut train, &train_path)?;
    write_csv(&mut processed.test, &test_path)?;
    step_done(&format!("{} + {}", train_path.display(), test_path.display()));

    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = load_table(data_path)?;

    kv("File", &data_path.display().to_string());
    kv("Rows", &df.height().to_string());
    kv("Columns", &df.width().to_string());
    kv("Memory", &format!("{:.2} MB", df.estimated_size() as f64 / 1024.0 / 1024.0));
    println!();

    println!("  {:<24} {:<12} {:>6} {:>8}", muted("Column"), muted("Type"), muted("Nulls"), muted("Unique"));
    println!("  {}", dim(&"─".repeat(54)));

    for col in df.get_columns() {
        println!(
            "  {:<24} {:<12} {:>6} {:>8}",
            col.name().as_str(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count(),
            col.n_unique().unwrap_or(0)
        );
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_train_command() {
        let cli = Cli::try_parse_from([
            "housing-automl",
            "train",
            "--train",
            "train.csv",
            "--test",
            "test.csv",
            "--model",
            "ridge",
            "--infrastructure",
            "mrt=mrt.csv",
            "--n-iter",
            "4",
        ])
        .unwrap();

        match cli.command {
            Commands::Train { pipeline, model, n_iter, output, .. } => {
                assert_eq!(pipeline.target, "price");
                assert_eq!(pipeline.infrastructure, vec!["mrt=mrt.csv".to_string()]);
                assert_eq!(model, "ridge");
                assert_eq!(n_iter, Some(4));
                assert_eq!(output, PathBuf::from("submission.csv"));
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_bad_infrastructure_spec() {
        let args = PipelineArgs {
            train: "a.csv".into(),
            test: "b.csv".into(),
            target: "price".into(),
            pipeline_config: None,
            infrastructure: vec!["no-separator".into()],
            subzones: None,
            subzone_key: "name".into(),
        };
        assert!(load_auxiliary(&args).is_err());
    }
}
