//! Pipeline Executor: runs a validated definition against the provider caller.

pub mod confirm;
pub mod context;
pub mod manifest;
pub mod merge;
pub mod pipeline;
pub mod report;

pub use confirm::{AutoApprove, AutoDecline, ConfirmationGate};
pub use context::ExecutionContext;
pub use pipeline::PipelineExecutor;
pub use report::{RunReport, RunStatus, StepFailure, StepResult};

use crate::cost::Money;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_MAX_WORKERS: usize = 4;

/// What happens to the rest of the run after a step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop before the next step.
    #[default]
    FailFast,
    /// Keep running steps that do not depend on the failed one.
    Continue,
}

#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Overrides the document's and the configured worker count.
    pub max_workers: Option<usize>,
    pub failure_policy: FailurePolicy,
    /// Ask the confirmation gate before running.
    pub confirm: bool,
    /// Refuse to run when the estimate is above this.
    pub max_cost: Option<Money>,
    /// Overrides the document's `output_dir`.
    pub output_dir: Option<PathBuf>,
}
