//! Validated pipeline graph produced by the chain parser.

use crate::registry::ModelDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDefinition {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<Step>,
    pub settings: PipelineSettings,
}

impl PipelineDefinition {
    /// Number of provider calls a full run makes.
    pub fn leaf_count(&self) -> usize {
        self.steps.iter().map(Step::leaf_count).sum()
    }

    /// Every single step with its enclosing group, in execution order.
    pub fn leaves(&self) -> impl Iterator<Item = (&SingleStep, Option<&ParallelGroup>)> {
        self.steps.iter().flat_map(|step| match step {
            Step::Single(single) => vec![(single, None)],
            Step::Parallel(group) => group.children.iter().map(|c| (c, Some(group))).collect(),
        })
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.id() == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSettings {
    pub output_dir: Option<PathBuf>,
    pub save_intermediates: bool,
    pub max_workers: Option<usize>,
    pub parallel_enabled: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            output_dir: None,
            save_intermediates: false,
            max_workers: None,
            parallel_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Single(SingleStep),
    Parallel(ParallelGroup),
}

impl Step {
    pub fn id(&self) -> &str {
        match self {
            Step::Single(step) => &step.id,
            Step::Parallel(group) => &group.id,
        }
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            Step::Single(step) => step.output.as_deref(),
            Step::Parallel(group) => group.output.as_deref(),
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            Step::Single(_) => 1,
            Step::Parallel(group) => group.children.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SingleStep {
    pub id: String,
    pub output: Option<String>,
    pub model: Arc<ModelDescriptor>,
    pub params: Map<String, Value>,
    /// Reference target text (`img`, `cat_image`, `grp.a`) to the id of the step producing it.
    pub bindings: BTreeMap<String, String>,
}

impl SingleStep {
    /// Ids of the steps this one reads from, without duplicates.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.bindings.values().map(String::as_str).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParallelGroup {
    pub id: String,
    pub output: Option<String>,
    pub merge: MergeStrategy,
    pub children: Vec<SingleStep>,
}

impl ParallelGroup {
    pub fn child(&self, id: &str) -> Option<&SingleStep> {
        self.children.iter().find(|child| child.id == id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Every child's output in declared order; fails if any child fails.
    #[default]
    CollectAll,
    /// First child in declared order that succeeded; fails only if all fail.
    FirstSuccess,
}

impl MergeStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeStrategy::CollectAll => "collect_all",
            MergeStrategy::FirstSuccess => "first_success",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collect_all" | "merge" => Ok(MergeStrategy::CollectAll),
            "first_success" => Ok(MergeStrategy::FirstSuccess),
            other => Err(format!("unknown merge strategy '{}'", other)),
        }
    }
}
