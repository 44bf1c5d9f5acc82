//! CLI route: single route table and run context. Dispatches to the engine and presentation.

use crate::cli::parse::{Commands, ConfigCommands};
use crate::cli::presentation::{
    format_config_text, format_estimate_json, format_estimate_text, format_models_json,
    format_models_text, format_report_text, format_validation_json, format_validation_text,
};
use crate::cli::terminal::{DialoguerGate, LineRenderer};
use crate::config::{ConfigLoader, EngineConfig};
use crate::cost::Money;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::executor::{ExecuteOptions, FailurePolicy};
use crate::progress::{JsonLinesSink, ProgressSink};
use crate::registry::{CatalogEntry, ModelCategory};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a command prints on stdout, and whether it succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub success: bool,
}

impl CommandOutput {
    fn ok(text: String) -> Self {
        Self {
            text,
            success: true,
        }
    }
}

/// Runtime context for CLI execution: loaded configuration and the engine.
pub struct RunContext {
    engine: Engine,
    config: EngineConfig,
}

impl RunContext {
    /// Load configuration (explicit file, or workspace discovery) and build the engine.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, EngineError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::from_config(config)
    }

    pub fn from_config(config: EngineConfig) -> Result<Self, EngineError> {
        let engine = Engine::from_config(&config)?.with_gate(Arc::new(DialoguerGate));
        Ok(Self { engine, config })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub async fn execute(&self, command: &Commands) -> Result<CommandOutput, EngineError> {
        match command {
            Commands::Validate { file, json } => self.handle_validate(file, *json),
            Commands::Estimate { file, json } => self.handle_estimate(file, *json),
            Commands::Run {
                file,
                yes,
                json,
                max_workers,
                continue_on_error,
                max_cost,
                output_dir,
            } => {
                let mut options = self.config.execute_options();
                options.max_workers = *max_workers;
                if *continue_on_error {
                    options.failure_policy = FailurePolicy::Continue;
                }
                options.max_cost = max_cost.map(Money::from_usd);
                options.output_dir = output_dir.clone();
                options.confirm = !*yes
                    && !*json
                    && self.config.executor.confirm
                    && std::io::stdin().is_terminal();
                self.handle_run(file, options, *json).await
            }
            Commands::Models { category, json } => self.handle_models(category.as_deref(), *json),
            Commands::Config {
                command: ConfigCommands::Show,
            } => self.handle_config_show(),
        }
    }

    fn handle_validate(&self, file: &Path, json: bool) -> Result<CommandOutput, EngineError> {
        let document = read_document(file)?;
        let errors = self.engine.validate(&document);
        let text = if json {
            format_validation_json(file, &errors)
        } else {
            format_validation_text(file, &errors)
        };
        Ok(CommandOutput {
            text,
            success: errors.is_empty(),
        })
    }

    fn handle_estimate(&self, file: &Path, json: bool) -> Result<CommandOutput, EngineError> {
        let document = read_document(file)?;
        let estimate = self.engine.estimate(&document)?;
        Ok(CommandOutput::ok(if json {
            format_estimate_json(&estimate)
        } else {
            format_estimate_text(&estimate)
        }))
    }

    /// Runs on a spawned task so Ctrl-C can cancel it through the run registry.
    async fn handle_run(
        &self,
        file: &Path,
        options: ExecuteOptions,
        json: bool,
    ) -> Result<CommandOutput, EngineError> {
        let document = read_document(file)?;
        let sink: Arc<dyn ProgressSink> = if json {
            Arc::new(JsonLinesSink::stdout())
        } else {
            Arc::new(LineRenderer::stderr())
        };

        let (run_id, mut events, task) = self.engine.spawn(&document, options)?.into_parts();
        let mut interrupted = false;
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => sink.emit(&event),
                    None => break,
                },
                _ = tokio::signal::ctrl_c(), if !interrupted => {
                    interrupted = true;
                    tracing::warn!(run_id = %run_id, "Interrupted; cancelling run");
                    if let Err(e) = self.engine.cancel(&run_id) {
                        tracing::debug!(error = %e, "Run already finished");
                    }
                }
            }
        }

        let report = task
            .await
            .map_err(|e| EngineError::RunAborted(e.to_string()))??;
        Ok(CommandOutput {
            // JSON mode already printed the report in the `complete` event.
            text: if json {
                String::new()
            } else {
                format_report_text(&report)
            },
            success: report.success,
        })
    }

    fn handle_models(&self, category: Option<&str>, json: bool) -> Result<CommandOutput, EngineError> {
        let registry = self.engine.registry();
        let entries: Vec<CatalogEntry> = match category {
            Some(value) => {
                let category: ModelCategory = value.parse().map_err(|_| {
                    EngineError::Config(format!(
                        "unknown category '{}' (expected one of: {})",
                        value,
                        ModelCategory::ALL
                            .iter()
                            .map(|c| c.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))
                })?;
                registry
                    .list_by_category(category)
                    .iter()
                    .map(|model| CatalogEntry::from(model.as_ref()))
                    .collect()
            }
            None => registry.all(),
        };
        Ok(CommandOutput::ok(if json {
            format_models_json(&entries)
        } else {
            format_models_text(&entries)
        }))
    }

    fn handle_config_show(&self) -> Result<CommandOutput, EngineError> {
        let configured: Vec<String> = crate::provider::ProviderId::ALL
            .iter()
            .filter(|id| std::env::var(self.config.provider(**id).api_key_env).is_ok())
            .map(|id| id.to_string())
            .collect();
        Ok(CommandOutput::ok(format_config_text(&self.config, &configured)?))
    }
}

fn read_document(file: &Path) -> Result<String, EngineError> {
    std::fs::read_to_string(file).map_err(|e| {
        EngineError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read {}: {}", file.display(), e),
        ))
    })
}
