//! Event schema for run progress.
//!
//! Every event is wrapped in a [`ProgressEnvelope`] carrying the run id, a
//! per-run sequence number and a millisecond timestamp. Serialized as one
//! flat JSON object per line: `{"seq":1,"ts":"...","run_id":"...","type":"start",...}`.

use crate::cost::Money;
use crate::error::StepError;
use crate::executor::RunReport;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Start {
        pipeline: String,
        total_steps: usize,
        estimated_cost: Money,
    },
    Progress {
        percent: u8,
        message: String,
    },
    StepComplete {
        step_id: String,
        cost: Money,
        duration_ms: u64,
    },
    Complete {
        result: Box<RunReport>,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step_id: Option<String>,
        cause: StepError,
    },
}

impl ProgressEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ProgressEvent::Start { .. } => "start",
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::StepComplete { .. } => "step_complete",
            ProgressEvent::Complete { .. } => "complete",
            ProgressEvent::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEnvelope {
    pub seq: u64,
    pub ts: String,
    pub run_id: String,
    #[serde(flatten)]
    pub event: ProgressEvent,
}

impl ProgressEnvelope {
    pub fn new(run_id: impl Into<String>, seq: u64, event: ProgressEvent) -> Self {
        Self {
            seq,
            ts: now_millis().to_string(),
            run_id: run_id.into(),
            event,
        }
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
