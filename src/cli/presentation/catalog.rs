//! Model catalog and configuration presentation.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::registry::CatalogEntry;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;

pub fn format_models_text(entries: &[CatalogEntry]) -> String {
    if entries.is_empty() {
        return "No models found.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Key", "Name", "Category", "Provider", "Base cost"]);
    for entry in entries {
        table.add_row(vec![
            entry.key.clone(),
            entry.name.clone(),
            entry.category.to_string(),
            entry.provider.to_string(),
            entry
                .base_cost
                .map(|cost| cost.to_string())
                .unwrap_or_else(|| "varies".to_string()),
        ]);
    }
    format!("{}\n\nTotal: {} model(s)", table, entries.len())
}

pub fn format_models_json(entries: &[CatalogEntry]) -> String {
    let out = json!({ "models": entries, "total": entries.len() });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

/// Effective configuration plus where credentials are read from.
pub fn format_config_text(config: &EngineConfig, configured: &[String]) -> Result<String, EngineError> {
    let mut out = config.to_toml()?;
    out.push_str(&format!("\n# {}\n", "credentials".bold()));
    for id in crate::provider::ProviderId::ALL {
        let provider = config.provider(id);
        let status = if configured.iter().any(|p| p == id.as_str()) {
            "set"
        } else {
            "missing"
        };
        out.push_str(&format!("# {} <- ${} ({})\n", id, provider.api_key_env, status));
    }
    Ok(out)
}
