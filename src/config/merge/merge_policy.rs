//! Built-in defaults, applied below every file and environment source.

use crate::executor::DEFAULT_MAX_WORKERS;
use crate::provider::RetryPolicy;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with default values set.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    let retry = RetryPolicy::default();
    Config::builder()
        .set_default("retry.max_attempts", i64::from(retry.max_attempts))?
        .set_default("retry.base_delay_ms", retry.base_delay.as_millis() as i64)?
        .set_default("retry.max_delay_ms", retry.max_delay.as_millis() as i64)?
        .set_default("executor.max_workers", DEFAULT_MAX_WORKERS as i64)?
        .set_default("executor.failure_policy", "fail_fast")?
        .set_default("executor.confirm", true)?
        .set_default("logging.level", "warn")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}
