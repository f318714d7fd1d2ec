//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// dbost build and release pipeline
///
/// Compiles the service suite, verifies it, builds the asset bundle, and
/// assembles and conditionally publishes the container images.
#[derive(Parser, Debug)]
#[command(name = "dbost-pipeline")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DBOST_PIPELINE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full build/release pipeline
    Run(RunArgs),

    /// Show the resolved publish plan without executing
    Plan(PlanArgs),

    /// Check host prerequisites and configuration
    Status,

    /// Manage the pipeline's cache volumes
    Cache(CacheArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Repository root to build (defaults to current directory)
    #[arg(short, long)]
    pub project: Option<PathBuf>,

    /// Publish assembled images (also enabled by PUBLISH="true")
    #[arg(long)]
    pub publish: bool,

    /// Release version used for image tags
    #[arg(long = "version-tag", env = "VERSION", default_value = "latest")]
    pub version_tag: String,
}

/// Arguments for the plan command
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Release version used for image tags
    #[arg(long = "version-tag", env = "VERSION", default_value = "latest")]
    pub version_tag: String,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List the pipeline's cache volumes
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove the pipeline's cache volumes
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}
