//! Housing AutoML - Main Entry Point

use clap::Parser;
use housing_automl::cli::{cmd_info, cmd_preprocess, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "housing_automl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            pipeline,
            model,
            grid,
            search_config,
            cv_folds,
            n_iter,
            output,
            report,
        } => {
            cmd_train(
                &pipeline,
                &model,
                grid.as_deref(),
                search_config.as_deref(),
                cv_folds,
                n_iter,
                &output,
                report.as_deref(),
            )?;
        }
        Commands::Preprocess { pipeline, output_dir } => {
            cmd_preprocess(&pipeline, &output_dir)?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
    }

    Ok(())
}
