//! CLI parse: clap types for aicp. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aicp - run AI content-generation pipelines
#[derive(Parser)]
#[command(name = "aicp")]
#[command(version)]
#[command(about = "Validate, price and run AI content-generation pipelines")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (where aicp.toml is looked up)
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stderr, stdout, file)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check a pipeline document without calling any provider
    Validate {
        /// Pipeline document (YAML or JSON)
        file: PathBuf,
        /// Print errors as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the cost estimate for a pipeline
    Estimate {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Run a pipeline
    Run {
        file: PathBuf,
        /// Skip the cost confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
        /// Print progress events as JSON lines on stdout
        #[arg(long)]
        json: bool,
        /// Maximum concurrent provider calls inside a parallel group
        #[arg(long)]
        max_workers: Option<usize>,
        /// Keep running steps that do not depend on a failed step
        #[arg(long)]
        continue_on_error: bool,
        /// Refuse to run when the estimate exceeds this many USD
        #[arg(long, value_name = "USD")]
        max_cost: Option<f64>,
        /// Directory for the run manifest (overrides the document's output_dir)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// List models in the catalog
    Models {
        /// Only models of this category (e.g. text_to_image)
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
}
