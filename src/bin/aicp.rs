//! aicp CLI binary.

use aicp::cli::{map_error, Cli, RunContext};
use aicp::config::ConfigLoader;
use aicp::logging::{init_logging, LoggingConfig};
use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli)?;
    init_logging(Some(&logging_config)).context("failed to initialize logging")?;

    info!("aicp starting");

    let context = match RunContext::new(cli.workspace.clone(), cli.config.clone()) {
        Ok(context) => context,
        Err(e) => {
            error!("Error loading configuration: {}", e);
            eprintln!("{}", map_error(&e));
            return Ok(ExitCode::FAILURE);
        }
    };

    match context.execute(&cli.command).await {
        Ok(output) => {
            if !output.text.is_empty() {
                println!("{}", output.text);
            }
            Ok(if output.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", map_error(&e));
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Logging config from the config file, overridden by CLI flags.
/// `AICP_LOG*` environment variables still win inside `init_logging`.
fn build_logging_config(cli: &Cli) -> anyhow::Result<LoggingConfig> {
    let mut config = match cli.config {
        Some(ref path) => ConfigLoader::load_from_file(path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default(),
        None => ConfigLoader::load(&cli.workspace)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default(),
    };

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.parse().context("invalid --log-format")?;
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.parse().context("invalid --log-output")?;
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
    }
    Ok(config)
}
