//! Raw pipeline document as written by the user (YAML or JSON).

use crate::error::ValidationError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

pub const PARALLEL_GROUP: &str = "parallel_group";

#[derive(Debug, Clone, Deserialize)]
pub struct RawPipeline {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<RawStep>,
    #[serde(default)]
    pub config: RawConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStep {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub step_type: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub merge_strategy: Option<String>,
    /// Children of a parallel group.
    #[serde(default)]
    pub steps: Vec<RawStep>,
}

impl RawStep {
    pub fn is_group(&self) -> bool {
        matches!(self.step_type.as_deref(), Some(PARALLEL_GROUP) | Some("parallel"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default, alias = "save_intermediate_results")]
    pub save_intermediates: bool,
    #[serde(default)]
    pub max_workers: Option<usize>,
    #[serde(default = "default_parallel_enabled")]
    pub parallel_enabled: bool,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            save_intermediates: false,
            max_workers: None,
            parallel_enabled: default_parallel_enabled(),
        }
    }
}

fn default_parallel_enabled() -> bool {
    true
}

/// Deserialize a document. JSON is accepted as YAML.
pub fn load_document(text: &str) -> Result<RawPipeline, ValidationError> {
    serde_yaml::from_str(text).map_err(|e| ValidationError::Document {
        message: e.to_string(),
    })
}
