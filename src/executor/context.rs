//! Per-run mutable state, written only from the executor's completion path.

use crate::artifact::Artifact;
use crate::cancel::CancellationSignal;
use crate::chain::SingleStep;
use crate::chain::reference::{self, Reference};
use crate::error::StepError;
use crate::executor::report::{StepFailure, StepResult};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Instant;

pub struct ExecutionContext {
    run_id: String,
    signal: CancellationSignal,
    results: HashMap<String, StepResult>,
    /// Step ids in completion order.
    order: Vec<String>,
    failures: Vec<StepFailure>,
    /// First failure that fails the run.
    fatal: Option<StepFailure>,
    seq: u64,
    leaves_done: usize,
    started: Instant,
}

impl ExecutionContext {
    pub fn new(run_id: impl Into<String>, signal: CancellationSignal) -> Self {
        Self {
            run_id: run_id.into(),
            signal,
            results: HashMap::new(),
            order: Vec::new(),
            failures: Vec::new(),
            fatal: None,
            seq: 0,
            leaves_done: 0,
            started: Instant::now(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn signal(&self) -> &CancellationSignal {
        &self.signal
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Next event sequence number, starting at 1.
    pub fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub fn record_success(&mut self, result: StepResult) {
        if !result.is_group() {
            self.leaves_done += 1;
        }
        self.order.push(result.step_id.clone());
        self.results.insert(result.step_id.clone(), result);
    }

    /// Record a failure. `fatal` failures decide the run outcome; the first one is kept.
    pub fn record_failure(&mut self, step_id: &str, error: StepError, leaf: bool, fatal: bool) {
        if leaf {
            self.leaves_done += 1;
        }
        let failure = StepFailure {
            step_id: step_id.to_string(),
            error,
        };
        if fatal && self.fatal.is_none() {
            self.fatal = Some(failure.clone());
        }
        self.failures.push(failure);
    }

    pub fn result(&self, step_id: &str) -> Option<&StepResult> {
        self.results.get(step_id)
    }

    pub fn failure(&self, step_id: &str) -> Option<&StepFailure> {
        self.failures.iter().find(|f| f.step_id == step_id)
    }

    pub fn fatal(&self) -> Option<&StepFailure> {
        self.fatal.as_ref()
    }

    pub fn leaves_done(&self) -> usize {
        self.leaves_done
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Substitute every reference in a step's parameters with upstream outputs.
    /// An upstream step without a result fails this one with `DependencyFailed`.
    pub fn resolve_params(&self, step: &SingleStep) -> Result<Map<String, Value>, StepError> {
        let mut resolve = |reference: &Reference| -> Result<Artifact, StepError> {
            let target = reference.target();
            let upstream = step
                .bindings
                .get(&target)
                .cloned()
                .unwrap_or(target);
            self.results
                .get(&upstream)
                .map(|result| result.artifact.clone())
                .ok_or(StepError::DependencyFailed { upstream })
        };
        let mut params = Map::new();
        for (name, value) in &step.params {
            params.insert(name.clone(), reference::substitute(value, &mut resolve)?);
        }
        Ok(params)
    }

    /// Completed results in completion order, and all failures.
    pub fn into_parts(mut self) -> (Vec<StepResult>, Vec<StepFailure>, Option<StepFailure>) {
        let results = self
            .order
            .iter()
            .filter_map(|id| self.results.remove(id))
            .collect();
        (results, self.failures, self.fatal)
    }
}
