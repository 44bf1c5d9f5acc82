//! User-level config file: `<config dir>/aicp/config.toml`.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use directories::ProjectDirs;
use std::path::PathBuf;

pub const GLOBAL_CONFIG_FILE: &str = "config.toml";

/// Platform config directory for aicp (`$XDG_CONFIG_HOME/aicp` on Linux).
pub fn global_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "aicp").map(|dirs| dirs.config_dir().join(GLOBAL_CONFIG_FILE))
}

/// Add the global config file to the builder if it exists.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let Some(path) = global_config_path() else {
        return Ok(builder);
    };
    if !path.exists() {
        tracing::debug!(config_path = %path.display(), "No global configuration file");
        return Ok(builder);
    }
    tracing::debug!(config_path = %path.display(), "Loading global configuration");
    Ok(builder.add_source(File::from(path).required(false)))
}
