//! The run loop.
//!
//! Top-level steps run one after another. A parallel group's children are
//! driven from this task through a `FuturesUnordered`, with a semaphore
//! bounding how many provider calls are in flight. All writes to the
//! [`ExecutionContext`] happen here as each call completes.

use crate::cancel::CancellationSignal;
use crate::chain::{MergeStrategy, ParallelGroup, PipelineDefinition, SingleStep, Step};
use crate::cost::{CostCalculator, CostEstimate, Money};
use crate::error::{EngineError, StepError};
use crate::executor::confirm::ConfirmationGate;
use crate::executor::context::ExecutionContext;
use crate::executor::manifest;
use crate::executor::merge::merge_group;
use crate::executor::report::{RunReport, RunStatus, StepResult};
use crate::executor::{ExecuteOptions, FailurePolicy, DEFAULT_MAX_WORKERS};
use crate::progress::{ProgressEnvelope, ProgressEvent, ProgressSink};
use crate::provider::{build_request, ProviderCaller, ProviderResponse, RequestSpec};
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

enum CallOutcome {
    Done {
        response: ProviderResponse,
        duration_ms: u64,
    },
    Failed(StepError),
    Skipped(String),
    Cancelled,
}

/// Fixed inputs of one run.
struct RunEnv<'a> {
    sink: &'a dyn ProgressSink,
    options: &'a ExecuteOptions,
    estimate: &'a CostEstimate,
    pipeline: &'a str,
    total_leaves: usize,
    workers: usize,
    parallel_enabled: bool,
    run_dir: Option<PathBuf>,
    save_intermediates: bool,
}

pub struct PipelineExecutor {
    caller: Arc<ProviderCaller>,
    calculator: Arc<CostCalculator>,
    default_workers: usize,
}

impl PipelineExecutor {
    pub fn new(caller: Arc<ProviderCaller>, calculator: Arc<CostCalculator>) -> Self {
        Self {
            caller,
            calculator,
            default_workers: DEFAULT_MAX_WORKERS,
        }
    }

    pub fn with_default_workers(mut self, workers: usize) -> Self {
        self.set_default_workers(workers);
        self
    }

    /// Used when neither the run options nor the document set a worker count.
    pub fn set_default_workers(&mut self, workers: usize) {
        self.default_workers = workers.max(1);
    }

    /// Estimate, optionally confirm, then run every step.
    ///
    /// Errors are returned only for problems found before any provider call
    /// (invalid cost parameters, budget). Step failures and cancellation end
    /// in a report.
    pub async fn execute(
        &self,
        run_id: &str,
        definition: &PipelineDefinition,
        options: &ExecuteOptions,
        gate: &dyn ConfirmationGate,
        sink: &dyn ProgressSink,
        signal: CancellationSignal,
    ) -> Result<RunReport, EngineError> {
        let mut status = RunStatus::Pending;
        let mut context = ExecutionContext::new(run_id, signal.clone());

        transition(run_id, &mut status, RunStatus::Estimating);
        let estimate = self
            .calculator
            .estimate_pipeline(definition)
            .map_err(EngineError::Validation)?;
        if let Some(limit) = options.max_cost {
            if estimate.total > limit {
                tracing::warn!(
                    run_id,
                    estimated = %estimate.total,
                    limit = %limit,
                    "Estimated cost exceeds budget"
                );
                return Err(EngineError::BudgetExceeded {
                    estimated: estimate.total,
                    limit,
                });
            }
        }

        let env = RunEnv {
            sink,
            options,
            estimate: &estimate,
            pipeline: &definition.name,
            total_leaves: definition.leaf_count(),
            workers: options
                .max_workers
                .or(definition.settings.max_workers)
                .unwrap_or(self.default_workers)
                .max(1),
            parallel_enabled: definition.settings.parallel_enabled,
            run_dir: options
                .output_dir
                .clone()
                .or_else(|| definition.settings.output_dir.clone())
                .map(|dir| dir.join(run_id)),
            save_intermediates: definition.settings.save_intermediates,
        };

        emit(
            &mut context,
            &env,
            ProgressEvent::Start {
                pipeline: definition.name.clone(),
                total_steps: env.total_leaves,
                estimated_cost: estimate.total,
            },
        );

        if options.confirm {
            transition(run_id, &mut status, RunStatus::AwaitingConfirmation);
            let approved = tokio::select! {
                biased;
                _ = signal.cancelled() => false,
                approved = gate.confirm(&estimate) => approved,
            };
            if !approved {
                tracing::info!(run_id, "Run not confirmed");
                return Ok(self.finish(context, &env, RunStatus::Cancelled));
            }
        }

        transition(run_id, &mut status, RunStatus::Running);
        tracing::info!(
            run_id,
            pipeline = %definition.name,
            steps = env.total_leaves,
            workers = env.workers,
            "Run started"
        );

        for step in &definition.steps {
            if context.is_cancelled() {
                break;
            }
            if context.fatal().is_some() && options.failure_policy == FailurePolicy::FailFast {
                break;
            }
            match step {
                Step::Single(single) => self.run_single(single, &env, &mut context).await,
                Step::Parallel(group) => self.run_group(group, &env, &mut context).await,
            }
        }

        let final_status = if context.is_cancelled() {
            RunStatus::Cancelled
        } else if context.fatal().is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        transition(run_id, &mut status, final_status);
        Ok(self.finish(context, &env, final_status))
    }

    async fn run_single(&self, step: &SingleStep, env: &RunEnv<'_>, context: &mut ExecutionContext) {
        let params = match context.resolve_params(step) {
            Ok(params) => params,
            Err(error) => {
                fail(context, env, &step.id, error, true, true);
                return;
            }
        };
        let request = build_request(&step.id, &step.model, params);
        tracing::info!(
            run_id = context.run_id(),
            step = %step.id,
            model = step.model.key,
            "Running step"
        );
        let signal = context.signal().clone();
        let outcome = call_step(&self.caller, &request, &signal).await;
        complete_leaf(step, None, outcome, env, context, true);
    }

    async fn run_group(&self, group: &ParallelGroup, env: &RunEnv<'_>, context: &mut ExecutionContext) {
        let started = Instant::now();

        let mut prepared: Vec<(&SingleStep, RequestSpec)> = Vec::with_capacity(group.children.len());
        for child in &group.children {
            match context.resolve_params(child) {
                Ok(params) => prepared.push((child, build_request(&child.id, &child.model, params))),
                Err(error) => fail(context, env, &child.id, error, true, false),
            }
        }

        let workers = if env.parallel_enabled { env.workers } else { 1 }
            .min(prepared.len())
            .max(1);
        tracing::info!(
            run_id = context.run_id(),
            group = %group.id,
            children = group.children.len(),
            workers,
            merge = %group.merge,
            "Running parallel group"
        );

        let semaphore = Semaphore::new(workers);
        let halt = AtomicBool::new(false);
        let halt_on_failure = env.options.failure_policy == FailurePolicy::FailFast
            && group.merge == MergeStrategy::CollectAll;
        let signal = context.signal().clone();
        let caller = &self.caller;

        let mut pending: FuturesUnordered<_> = prepared
            .iter()
            .map(|(child, request)| {
                let semaphore = &semaphore;
                let halt = &halt;
                let signal = &signal;
                async move {
                    let outcome = match semaphore.acquire().await {
                        Err(_) => CallOutcome::Cancelled,
                        Ok(_permit) => {
                            if signal.is_cancelled() {
                                CallOutcome::Cancelled
                            } else if halt.load(Ordering::SeqCst) {
                                CallOutcome::Skipped(format!(
                                    "group '{}' stopped after a child failed",
                                    group.id
                                ))
                            } else {
                                call_step(caller, request, signal).await
                            }
                        }
                    };
                    (*child, outcome)
                }
            })
            .collect();

        while let Some((child, outcome)) = pending.next().await {
            if halt_on_failure && matches!(outcome, CallOutcome::Failed(_)) {
                halt.store(true, Ordering::SeqCst);
            }
            complete_leaf(child, Some(&group.id), outcome, env, context, false);
        }
        drop(pending);

        if context.is_cancelled() {
            return;
        }

        match merge_group(group, context) {
            Ok(artifact) => {
                let cost: Money = group
                    .children
                    .iter()
                    .filter_map(|child| context.result(&child.id))
                    .map(|result| result.cost)
                    .sum();
                context.record_success(StepResult {
                    step_id: group.id.clone(),
                    model: None,
                    group: None,
                    artifact,
                    cost,
                    duration_ms: started.elapsed().as_millis() as u64,
                });
                let percent = percent(context.leaves_done(), env.total_leaves);
                emit(
                    context,
                    env,
                    ProgressEvent::Progress {
                        percent,
                        message: format!("group {} merged ({})", group.id, group.merge),
                    },
                );
            }
            Err(error) => fail(context, env, &group.id, error, false, true),
        }
    }

    fn finish(&self, mut context: ExecutionContext, env: &RunEnv<'_>, status: RunStatus) -> RunReport {
        let run_id = context.run_id().to_string();
        let duration_ms = context.elapsed_ms();
        let complete_seq = context.next_seq();
        let (results, failures, fatal) = context.into_parts();

        let outputs = results
            .iter()
            .map(|result| (result.step_id.clone(), result.artifact.clone()))
            .collect();
        let total_cost: Money = results
            .iter()
            .filter(|result| !result.is_group())
            .map(|result| result.cost)
            .sum();
        let (failed_step_id, cause) = match (status, fatal) {
            (RunStatus::Cancelled, _) => (None, Some(StepError::Cancelled)),
            (_, Some(fatal)) => (Some(fatal.step_id), Some(fatal.error)),
            (_, None) => (None, None),
        };

        let mut report = RunReport {
            run_id: run_id.clone(),
            pipeline: env.pipeline.to_string(),
            status,
            success: status == RunStatus::Completed,
            outputs,
            results,
            failures,
            total_cost,
            estimated_cost: env.estimate.total,
            duration_ms,
            failed_step_id,
            cause,
            manifest: None,
        };

        if let Some(run_dir) = &env.run_dir {
            report.manifest = Some(run_dir.join(manifest::MANIFEST_FILE));
            if let Err(e) = manifest::write_manifest(run_dir, &report) {
                tracing::warn!(run_id = %run_id, error = %e, "Failed to write run manifest");
                report.manifest = None;
            }
        }

        tracing::info!(
            run_id = %run_id,
            status = %report.status,
            total_cost = %report.total_cost,
            duration_ms = report.duration_ms,
            "Run finished"
        );
        env.sink.emit(&ProgressEnvelope::new(
            run_id,
            complete_seq,
            ProgressEvent::Complete {
                result: Box::new(report.clone()),
            },
        ));
        report
    }
}

async fn call_step(caller: &ProviderCaller, request: &RequestSpec, signal: &CancellationSignal) -> CallOutcome {
    let started = Instant::now();
    match caller.call(request, signal).await {
        Ok(response) => CallOutcome::Done {
            response,
            duration_ms: started.elapsed().as_millis() as u64,
        },
        Err(error) if error.is_cancelled() => CallOutcome::Cancelled,
        Err(error) => CallOutcome::Failed(error.into()),
    }
}

fn complete_leaf(
    step: &SingleStep,
    group: Option<&str>,
    outcome: CallOutcome,
    env: &RunEnv<'_>,
    context: &mut ExecutionContext,
    fatal: bool,
) {
    match outcome {
        CallOutcome::Done {
            response,
            duration_ms,
        } => {
            let cost = response
                .billed_cost
                .or_else(|| env.estimate.step_cost(&step.id))
                .unwrap_or(Money::ZERO);
            let result = StepResult {
                step_id: step.id.clone(),
                model: Some(step.model.key.to_string()),
                group: group.map(str::to_string),
                artifact: response.artifact,
                cost,
                duration_ms,
            };
            if env.save_intermediates {
                if let Some(run_dir) = &env.run_dir {
                    if let Err(e) = manifest::write_step(run_dir, &result, &response.raw) {
                        tracing::warn!(step = %step.id, error = %e, "Failed to save intermediate result");
                    }
                }
            }
            tracing::info!(
                run_id = context.run_id(),
                step = %step.id,
                cost = %cost,
                duration_ms,
                "Step completed"
            );
            context.record_success(result);
            emit(
                context,
                env,
                ProgressEvent::StepComplete {
                    step_id: step.id.clone(),
                    cost,
                    duration_ms,
                },
            );
            let percent = percent(context.leaves_done(), env.total_leaves);
            emit(
                context,
                env,
                ProgressEvent::Progress {
                    percent,
                    message: format!("{} done", step.id),
                },
            );
        }
        CallOutcome::Failed(error) => fail(context, env, &step.id, error, true, fatal),
        CallOutcome::Skipped(reason) => {
            tracing::debug!(step = %step.id, reason = %reason, "Step skipped");
            context.record_failure(&step.id, StepError::Skipped { reason }, true, false);
        }
        CallOutcome::Cancelled => {
            tracing::debug!(step = %step.id, "Step cancelled");
        }
    }
}

fn fail(
    context: &mut ExecutionContext,
    env: &RunEnv<'_>,
    step_id: &str,
    error: StepError,
    leaf: bool,
    fatal: bool,
) {
    tracing::warn!(
        run_id = context.run_id(),
        step = step_id,
        classification = error.classification(),
        error = %error,
        "Step failed"
    );
    context.record_failure(step_id, error.clone(), leaf, fatal);
    emit(
        context,
        env,
        ProgressEvent::Error {
            step_id: Some(step_id.to_string()),
            cause: error,
        },
    );
}

fn emit(context: &mut ExecutionContext, env: &RunEnv<'_>, event: ProgressEvent) {
    let seq = context.next_seq();
    env.sink
        .emit(&ProgressEnvelope::new(context.run_id(), seq, event));
}

fn transition(run_id: &str, status: &mut RunStatus, next: RunStatus) {
    tracing::debug!(run_id, from = %status, to = %next, "Run state changed");
    *status = next;
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}
