//! Engine configuration.
//!
//! Layered through the `config` crate: built-in defaults, the global file, the
//! workspace files, then `AICP__SECTION__KEY` environment variables. Provider
//! credentials are never part of the configuration; only the names of the
//! environment variables holding them are.

use crate::error::EngineError;
use crate::executor::{ExecuteOptions, FailurePolicy, DEFAULT_MAX_WORKERS};
use crate::logging::LoggingConfig;
use crate::provider::{AuthScheme, ProviderId, RetryPolicy};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;
pub use sources::workspace_file::WORKSPACE_CONFIG_FILE;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Overrides per provider; anything unset uses the provider's defaults.
    #[serde(default)]
    pub providers: BTreeMap<ProviderId, ProviderSettings>,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub executor: ExecutorSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Per-attempt timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Environment variable holding the comma-separated key list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthScheme>,
}

/// Provider settings with defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProvider {
    pub id: ProviderId,
    pub base_url: String,
    pub timeout: Duration,
    pub api_key_env: String,
    pub auth: AuthScheme,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    RetryPolicy::default().max_attempts
}

fn default_base_delay_ms() -> u64 {
    RetryPolicy::default().base_delay.as_millis() as u64
}

fn default_max_delay_ms() -> u64 {
    RetryPolicy::default().max_delay.as_millis() as u64
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorSettings {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Ask before spending when running interactively.
    #[serde(default = "default_confirm")]
    pub confirm: bool,
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_confirm() -> bool {
    true
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            failure_policy: FailurePolicy::default(),
            confirm: default_confirm(),
        }
    }
}

impl EngineConfig {
    pub fn provider(&self, id: ProviderId) -> ResolvedProvider {
        let settings = self.providers.get(&id);
        ResolvedProvider {
            id,
            base_url: settings
                .and_then(|s| s.base_url.clone())
                .unwrap_or_else(|| id.default_base_url().to_string()),
            timeout: settings
                .and_then(|s| s.timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or_else(|| id.default_timeout()),
            api_key_env: settings
                .and_then(|s| s.api_key_env.clone())
                .unwrap_or_else(|| id.default_env_var().to_string()),
            auth: settings
                .and_then(|s| s.auth.clone())
                .unwrap_or_else(|| id.default_auth()),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    /// Run options implied by the `[executor]` section. Confirmation is left to the caller.
    pub fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            failure_policy: self.executor.failure_policy,
            ..ExecuteOptions::default()
        }
    }

    /// Every problem in the configuration, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (id, settings) in &self.providers {
            if let Some(url) = &settings.base_url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    errors.push(format!("providers.{}.base_url '{}' is not an http(s) URL", id, url));
                }
            }
            if settings.timeout_secs == Some(0) {
                errors.push(format!("providers.{}.timeout_secs must be positive", id));
            }
            if matches!(&settings.api_key_env, Some(name) if name.trim().is_empty()) {
                errors.push(format!("providers.{}.api_key_env cannot be empty", id));
            }
            if matches!(&settings.auth, Some(AuthScheme::Header(name)) if name.trim().is_empty()) {
                errors.push(format!("providers.{}.auth header name cannot be empty", id));
            }
        }

        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be at least 1".to_string());
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            errors.push(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            ));
        }
        if self.executor.max_workers == 0 {
            errors.push("executor.max_workers must be at least 1".to_string());
        }
        errors.extend(self.logging.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }
}

/// Builds an [`EngineConfig`] from every configured source.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, global file, workspace files, then environment.
    pub fn load(workspace_root: &Path) -> Result<EngineConfig, EngineError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let config = builder.add_source(environment()).build()?;
        Self::finish(config)
    }

    /// Defaults plus one explicit file; the file must exist.
    pub fn load_from_file(path: &Path) -> Result<EngineConfig, EngineError> {
        let config = merge::merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?;
        Self::finish(config)
    }

    fn finish(config: Config) -> Result<EngineConfig, EngineError> {
        let engine_config: EngineConfig = config.try_deserialize()?;
        engine_config.validate().map_err(|errors| {
            EngineError::Config(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            ))
        })?;
        tracing::debug!(
            providers = engine_config.providers.len(),
            max_workers = engine_config.executor.max_workers,
            "Configuration loaded"
        );
        Ok(engine_config)
    }
}

/// `AICP__RETRY__MAX_ATTEMPTS=5`, `AICP__PROVIDERS__FAL__BASE_URL=...`
fn environment() -> Environment {
    Environment::with_prefix("AICP")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
