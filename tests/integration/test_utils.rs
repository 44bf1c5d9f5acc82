//! Shared test utilities for integration tests
//!
//! A scripted in-memory provider transport, a small model registry for the
//! scenarios, and an engine wired to both with an instant clock so retries
//! never sleep for real.

use aicp::artifact::Artifact;
use aicp::cost::{CostFormula, Money};
use aicp::credentials::{Credential, CredentialPool, CredentialStore};
use aicp::engine::Engine;
use aicp::provider::{
    InstantClock, ProviderCaller, ProviderId, ProviderResponse, ProviderTransport, RequestSpec,
    TransportError,
};
use aicp::registry::{ArtifactKind, ModelCategory, ModelDescriptor, ModelRegistry, ParamKind, ParamSpec};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub step_id: String,
    pub model: String,
    pub key: String,
    pub body: Value,
}

/// Transport that answers from per-step scripts and records every attempt.
/// Unscripted attempts succeed with `https://mock.test/<step_id>`.
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<String, VecDeque<Result<ProviderResponse, TransportError>>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<RecordedCall>>,
    completed: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the outcome of the next attempt for `step_id`.
    pub fn script(&self, step_id: &str, outcome: Result<ProviderResponse, TransportError>) {
        self.scripts
            .lock()
            .entry(step_id.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn fail_with_status(&self, step_id: &str, status: u16) {
        self.script(step_id, Err(status_error(status)));
    }

    pub fn delay(&self, step_id: &str, delay: Duration) {
        self.delays.lock().insert(step_id.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_for(&self, step_id: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.step_id == step_id).count()
    }

    /// Step ids in the order their attempts started.
    pub fn call_order(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.step_id.clone()).collect()
    }

    /// Step ids in the order their attempts finished.
    pub fn completion_order(&self) -> Vec<String> {
        self.completed.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderTransport for MockTransport {
    async fn send(
        &self,
        request: &RequestSpec,
        credential: &Credential,
    ) -> Result<ProviderResponse, TransportError> {
        self.calls.lock().push(RecordedCall {
            step_id: request.step_id.clone(),
            model: request.model.clone(),
            key: credential.expose().to_string(),
            body: request.body.clone(),
        });
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let delay = self.delays.lock().get(&request.step_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .scripts
            .lock()
            .get_mut(&request.step_id)
            .and_then(VecDeque::pop_front);
        self.completed.lock().push(request.step_id.clone());
        scripted.unwrap_or_else(|| Ok(default_response(request)))
    }
}

pub fn default_response(request: &RequestSpec) -> ProviderResponse {
    let artifact = match request.output_kind {
        ArtifactKind::Text => Artifact::text(format!("text from {}", request.step_id)),
        kind => Artifact::media(kind, mock_url(&request.step_id)),
    };
    ProviderResponse {
        artifact,
        raw: json!({ "step": request.step_id }),
        billed_cost: None,
    }
}

pub fn mock_url(step_id: &str) -> String {
    format!("https://mock.test/{}", step_id)
}

pub fn status_error(status: u16) -> TransportError {
    TransportError::Status {
        status,
        body: format!("status {}", status),
        retry_after: None,
    }
}

/// `m1` text→image ($0.04), `m2` image→video ($0.25), `m3` text→speech ($0.01),
/// `p1` prompt generation ($0.001). All on fal.
pub fn scenario_registry() -> Arc<ModelRegistry> {
    Arc::new(ModelRegistry::from_models([
        ModelDescriptor::new(
            "m1",
            "Mock image",
            ModelCategory::TextToImage,
            ProviderId::Fal,
            "mock/m1",
            CostFormula::Flat(Money::from_micros(40_000)),
        )
        .with_params(vec![
            ParamSpec::required("text", ParamKind::Text),
            ParamSpec::optional("seed", ParamKind::Integer),
        ]),
        ModelDescriptor::new(
            "m2",
            "Mock video",
            ModelCategory::ImageToVideo,
            ProviderId::Fal,
            "mock/m2",
            CostFormula::Flat(Money::from_micros(250_000)),
        )
        .with_params(vec![
            ParamSpec::required("image", ParamKind::Image),
            ParamSpec::optional("prompt", ParamKind::Text),
        ]),
        ModelDescriptor::new(
            "m3",
            "Mock speech",
            ModelCategory::TextToSpeech,
            ProviderId::Fal,
            "mock/m3",
            CostFormula::Flat(Money::from_micros(10_000)),
        )
        .with_params(vec![ParamSpec::required("text", ParamKind::Text)]),
        ModelDescriptor::new(
            "p1",
            "Mock prompt",
            ModelCategory::PromptGeneration,
            ProviderId::Fal,
            "mock/p1",
            CostFormula::Flat(Money::from_micros(1_000)),
        )
        .with_params(vec![ParamSpec::required("prompt", ParamKind::Text)]),
    ]))
}

pub fn fal_store(keys: &[&str]) -> Arc<CredentialStore> {
    Arc::new(CredentialStore::new().with_pool(CredentialPool::new(
        ProviderId::Fal,
        "FAL_KEY",
        keys.iter().map(|k| k.to_string()).collect(),
    )))
}

pub struct Harness {
    pub engine: Engine,
    pub transport: Arc<MockTransport>,
    pub clock: Arc<InstantClock>,
    pub credentials: Arc<CredentialStore>,
}

pub fn harness() -> Harness {
    harness_with_keys(&["fal-key-1"])
}

pub fn harness_with_keys(keys: &[&str]) -> Harness {
    let transport = MockTransport::new();
    let clock = Arc::new(InstantClock::new());
    let credentials = fal_store(keys);
    let caller = ProviderCaller::new(transport.clone(), Arc::clone(&credentials))
        .with_clock(clock.clone());
    Harness {
        engine: Engine::new(scenario_registry(), Arc::new(caller)),
        transport,
        clock,
        credentials,
    }
}

/// The two-step scenario: an image from text, then a video from that image.
pub const IMG_TO_VID: &str = r#"
name: cat-video
steps:
  - id: img
    type: text_to_image
    model: m1
    params:
      text: "a cat"
  - id: vid
    type: image_to_video
    model: m2
    params:
      image: "$img"
"#;
