//! Engine façade.
//!
//! Owns the registry, parser, calculator and executor, and tracks live runs so
//! that [`Engine::cancel`] can reach a run from another task. Cheap to clone.

use crate::cancel::CancellationSignal;
use crate::chain::{ChainParser, PipelineDefinition};
use crate::config::EngineConfig;
use crate::cost::{CostCalculator, CostEstimate};
use crate::credentials::CredentialStore;
use crate::error::{EngineError, ValidationError};
use crate::executor::{AutoApprove, ConfirmationGate, ExecuteOptions, PipelineExecutor, RunReport};
use crate::progress::{ChannelSink, ProgressEnvelope, ProgressSink};
use crate::provider::{HttpTransport, ProviderCaller, ProviderId};
use crate::registry::ModelRegistry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    registry: Arc<ModelRegistry>,
    parser: ChainParser,
    calculator: Arc<CostCalculator>,
    executor: PipelineExecutor,
    gate: Arc<dyn ConfirmationGate>,
    runs: Mutex<HashMap<String, CancellationSignal>>,
    run_counter: AtomicU64,
}

/// A run started with [`Engine::spawn`].
pub struct RunHandle {
    pub run_id: String,
    pub events: mpsc::UnboundedReceiver<ProgressEnvelope>,
    task: JoinHandle<Result<RunReport, EngineError>>,
}

impl RunHandle {
    /// Wait for the final report. Events still buffered in `events` stay readable.
    pub async fn wait(self) -> Result<RunReport, EngineError> {
        self.task
            .await
            .map_err(|e| EngineError::RunAborted(e.to_string()))?
    }

    /// Split into the event stream and a future for the report.
    pub fn into_parts(
        self,
    ) -> (
        String,
        mpsc::UnboundedReceiver<ProgressEnvelope>,
        JoinHandle<Result<RunReport, EngineError>>,
    ) {
        (self.run_id, self.events, self.task)
    }
}

/// Removes a run from the registry when the run ends, however it ends.
struct RunGuard {
    inner: Arc<EngineInner>,
    run_id: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.inner.runs.lock().remove(&self.run_id);
    }
}

impl Engine {
    pub fn new(registry: Arc<ModelRegistry>, caller: Arc<ProviderCaller>) -> Self {
        let calculator = Arc::new(CostCalculator::new(Arc::clone(&registry)));
        Self {
            inner: Arc::new(EngineInner {
                parser: ChainParser::new(Arc::clone(&registry)),
                executor: PipelineExecutor::new(caller, Arc::clone(&calculator)),
                registry,
                calculator,
                gate: Arc::new(AutoApprove),
                runs: Mutex::new(HashMap::new()),
                run_counter: AtomicU64::new(0),
            }),
        }
    }

    /// Builtin catalog, HTTP transport and environment credentials, per `config`.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut transport = HttpTransport::new()
            .map_err(|e| EngineError::Config(format!("Failed to build HTTP client: {}", e)))?;
        for id in ProviderId::ALL {
            let provider = config.provider(id);
            transport = transport.with_endpoint(id, provider.base_url, provider.auth);
        }

        let credentials = CredentialStore::from_env(|id| config.provider(id).api_key_env);
        let mut caller = ProviderCaller::new(Arc::new(transport), Arc::new(credentials))
            .with_policy(config.retry_policy());
        for id in ProviderId::ALL {
            caller = caller.with_timeout(id, config.provider(id).timeout);
        }

        Ok(Self::new(Arc::new(ModelRegistry::builtin()), Arc::new(caller))
            .with_default_workers(config.executor.max_workers))
    }

    /// Must be called before the engine is cloned or shared.
    pub fn with_gate(self, gate: Arc<dyn ConfirmationGate>) -> Self {
        self.map_inner(|inner| inner.gate = gate)
    }

    pub fn with_default_workers(self, workers: usize) -> Self {
        self.map_inner(|inner| inner.executor.set_default_workers(workers))
    }

    fn map_inner(self, f: impl FnOnce(&mut EngineInner)) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                f(&mut inner);
                Self {
                    inner: Arc::new(inner),
                }
            }
            Err(shared) => {
                tracing::warn!("Engine already shared; builder setting ignored");
                Self { inner: shared }
            }
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.inner.registry
    }

    pub fn parse(&self, document: &str) -> Result<PipelineDefinition, EngineError> {
        Ok(self.inner.parser.parse(document)?)
    }

    /// Every problem in the document, including cost parameters. Empty when valid.
    pub fn validate(&self, document: &str) -> Vec<ValidationError> {
        match self.inner.parser.parse(document) {
            Ok(definition) => match self.inner.calculator.estimate_pipeline(&definition) {
                Ok(_) => Vec::new(),
                Err(errors) => errors,
            },
            Err(errors) => errors,
        }
    }

    pub fn estimate(&self, document: &str) -> Result<CostEstimate, EngineError> {
        let definition = self.parse(document)?;
        Ok(self.inner.calculator.estimate_pipeline(&definition)?)
    }

    /// Parse and run a document to completion, streaming events into `sink`.
    pub async fn execute(
        &self,
        document: &str,
        options: ExecuteOptions,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<RunReport, EngineError> {
        let definition = self.parse(document)?;
        self.execute_definition(&definition, options, sink).await
    }

    pub async fn execute_definition(
        &self,
        definition: &PipelineDefinition,
        options: ExecuteOptions,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<RunReport, EngineError> {
        let (run_id, signal, _guard) = self.register_run();
        self.inner
            .executor
            .execute(
                &run_id,
                definition,
                &options,
                self.inner.gate.as_ref(),
                sink.as_ref(),
                signal,
            )
            .await
    }

    /// Parse, then run on a background task. Validation errors are returned here,
    /// before anything is spawned.
    pub fn spawn(&self, document: &str, options: ExecuteOptions) -> Result<RunHandle, EngineError> {
        let definition = self.parse(document)?;
        let (sink, events) = ChannelSink::new();
        let (run_id, signal, guard) = self.register_run();
        let inner = Arc::clone(&self.inner);
        let task_run_id = run_id.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            inner
                .executor
                .execute(
                    &task_run_id,
                    &definition,
                    &options,
                    inner.gate.as_ref(),
                    &sink,
                    signal,
                )
                .await
        });
        Ok(RunHandle {
            run_id,
            events,
            task,
        })
    }

    /// Cancel a live run. In-flight provider calls are aborted; the run still
    /// produces a report with status `cancelled`.
    pub fn cancel(&self, run_id: &str) -> Result<(), EngineError> {
        let runs = self.inner.runs.lock();
        let signal = runs
            .get(run_id)
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))?;
        tracing::info!(run_id, "Cancelling run");
        signal.cancel();
        Ok(())
    }

    pub fn active_runs(&self) -> Vec<String> {
        let mut runs: Vec<String> = self.inner.runs.lock().keys().cloned().collect();
        runs.sort();
        runs
    }

    fn register_run(&self) -> (String, CancellationSignal, RunGuard) {
        let n = self.inner.run_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let run_id = format!("run-{}-{}", crate::progress::now_millis(), n);
        let signal = CancellationSignal::new();
        self.inner
            .runs
            .lock()
            .insert(run_id.clone(), signal.clone());
        let guard = RunGuard {
            inner: Arc::clone(&self.inner),
            run_id: run_id.clone(),
        };
        (run_id, signal, guard)
    }
}
