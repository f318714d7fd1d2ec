//! dbost pipeline CLI entry point
//!
//! Dispatches to subcommands; on fatal errors the process exits non-zero
//! with nothing published.

use clap::Parser;
use console::style;
use dbost_pipeline::cli::{Cli, Commands};
use dbost_pipeline::config::ConfigManager;
use dbost_pipeline::error::PipelineResult;
use dbost_pipeline::ui;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> PipelineResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn (progress output only), 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("dbost_pipeline=warn"),
        1 => EnvFilter::new("dbost_pipeline=info"),
        _ => EnvFilter::new("dbost_pipeline=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    ui::init_theme();

    let cwd = std::env::current_dir()
        .map_err(|e| dbost_pipeline::error::PipelineError::io("getting current directory", e))?;

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = config_manager.load(&cwd).await?;

    ConfigManager::ensure_state_dirs().await?;

    match cli.command {
        Commands::Run(args) => dbost_pipeline::cli::commands::run(args, &config).await,
        Commands::Plan(args) => dbost_pipeline::cli::commands::plan(args, &config),
        Commands::Status => dbost_pipeline::cli::commands::status(&config).await,
        Commands::Cache(args) => dbost_pipeline::cli::commands::cache(args).await,
    }
}
