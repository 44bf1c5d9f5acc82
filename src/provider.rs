//! Provider Caller
//!
//! One logical call per step. Each attempt is a single request through a
//! [`ProviderTransport`], bounded by the provider's timeout and raced against
//! the run's cancellation signal. Failures are classified by
//! [`retry::FailureClass`] and retried with backoff and key rotation.

pub mod http;
pub mod request;
pub mod retry;

pub use http::HttpTransport;
pub use request::{build_request, RequestSpec};
pub use retry::{Clock, FailureClass, InstantClock, RetryDecision, RetryPolicy, RetryState, TokioClock};

use crate::artifact::Artifact;
use crate::cancel::CancellationSignal;
use crate::cost::Money;
use crate::credentials::{Credential, CredentialStore};
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Fal,
    Replicate,
    ElevenLabs,
    OpenRouter,
    Gemini,
}

impl ProviderId {
    pub const ALL: [ProviderId; 5] = [
        ProviderId::Fal,
        ProviderId::Replicate,
        ProviderId::ElevenLabs,
        ProviderId::OpenRouter,
        ProviderId::Gemini,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderId::Fal => "fal",
            ProviderId::Replicate => "replicate",
            ProviderId::ElevenLabs => "elevenlabs",
            ProviderId::OpenRouter => "openrouter",
            ProviderId::Gemini => "gemini",
        }
    }

    /// Environment variable holding the comma-separated key list.
    pub fn default_env_var(self) -> &'static str {
        match self {
            ProviderId::Fal => "FAL_KEY",
            ProviderId::Replicate => "REPLICATE_API_TOKEN",
            ProviderId::ElevenLabs => "ELEVENLABS_API_KEY",
            ProviderId::OpenRouter => "OPENROUTER_API_KEY",
            ProviderId::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderId::Fal => "https://fal.run",
            ProviderId::Replicate => "https://api.replicate.com/v1",
            ProviderId::ElevenLabs => "https://api.elevenlabs.io",
            ProviderId::OpenRouter => "https://openrouter.ai/api/v1",
            ProviderId::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    /// Ceiling for one attempt. Video providers hold the connection while rendering.
    pub fn default_timeout(self) -> Duration {
        match self {
            ProviderId::Fal | ProviderId::Replicate => Duration::from_secs(600),
            ProviderId::ElevenLabs => Duration::from_secs(120),
            ProviderId::OpenRouter | ProviderId::Gemini => Duration::from_secs(90),
        }
    }

    pub fn default_auth(self) -> AuthScheme {
        match self {
            ProviderId::Fal => AuthScheme::Key,
            ProviderId::Replicate | ProviderId::OpenRouter => AuthScheme::Bearer,
            ProviderId::ElevenLabs => AuthScheme::Header("xi-api-key".to_string()),
            ProviderId::Gemini => AuthScheme::Header("x-goog-api-key".to_string()),
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderId::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s.to_ascii_lowercase())
            .ok_or_else(|| format!("unknown provider '{}'", s))
    }
}

/// How a key is attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// `Authorization: Key <key>`
    Key,
    /// `Authorization: Bearer <key>`
    Bearer,
    /// Raw key in the named header.
    Header(String),
}

/// What a successful attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub artifact: Artifact,
    /// Provider response body, kept for intermediate result files.
    pub raw: Value,
    /// Cost reported by the provider, when it reports one.
    pub billed_cost: Option<Money>,
}

impl ProviderResponse {
    pub fn new(artifact: Artifact) -> Self {
        Self {
            artifact,
            raw: Value::Null,
            billed_cost: None,
        }
    }
}

/// Failure of a single attempt, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The adapter contract every provider integration satisfies.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn send(
        &self,
        request: &RequestSpec,
        credential: &Credential,
    ) -> Result<ProviderResponse, TransportError>;
}

const MAX_ERROR_BODY: usize = 500;

pub struct ProviderCaller {
    transport: Arc<dyn ProviderTransport>,
    credentials: Arc<CredentialStore>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    timeouts: HashMap<ProviderId, Duration>,
}

impl ProviderCaller {
    pub fn new(transport: Arc<dyn ProviderTransport>, credentials: Arc<CredentialStore>) -> Self {
        Self {
            transport,
            credentials,
            policy: RetryPolicy::default(),
            clock: Arc::new(TokioClock),
            timeouts: HashMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeout(mut self, provider: ProviderId, timeout: Duration) -> Self {
        self.timeouts.insert(provider, timeout);
        self
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    fn timeout_for(&self, provider: ProviderId) -> Duration {
        self.timeouts
            .get(&provider)
            .copied()
            .unwrap_or_else(|| provider.default_timeout())
    }

    /// Perform one logical call with retries. Returns as soon as `signal` is cancelled.
    pub async fn call(
        &self,
        request: &RequestSpec,
        signal: &CancellationSignal,
    ) -> Result<ProviderResponse, ProviderError> {
        let provider = request.provider;
        let pool = self.credentials.pool(provider)?;
        let timeout = self.timeout_for(provider);
        let mut state = RetryState::new(self.policy.clone());
        let mut key = pool.current()?;

        loop {
            if signal.is_cancelled() {
                return Err(ProviderError::Cancelled { provider });
            }

            tracing::debug!(
                step = %request.step_id,
                model = %request.model,
                provider = %provider,
                attempt = state.attempts() + 1,
                key = %key.fingerprint(),
                "Sending provider request"
            );

            let outcome = tokio::select! {
                biased;
                _ = signal.cancelled() => return Err(ProviderError::Cancelled { provider }),
                result = tokio::time::timeout(timeout, self.transport.send(request, &key)) => {
                    result.unwrap_or(Err(TransportError::Timeout))
                }
            };

            let error = match outcome {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            let class = FailureClass::classify(&error);
            match state.record_failure(&class) {
                RetryDecision::GiveUp => {
                    if class == FailureClass::CredentialRejected {
                        pool.mark_failed(&key);
                    }
                    tracing::warn!(
                        step = %request.step_id,
                        provider = %provider,
                        attempts = state.attempts(),
                        error = %error,
                        "Provider call failed"
                    );
                    return Err(give_up(provider, &class, error, state.attempts()));
                }
                RetryDecision::Retry {
                    delay,
                    rotate_key,
                    blacklist_key,
                } => {
                    tracing::warn!(
                        step = %request.step_id,
                        provider = %provider,
                        attempt = state.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying provider call"
                    );
                    if blacklist_key {
                        pool.mark_failed(&key);
                        key = pool.rotate_from(&key)?;
                    } else if rotate_key {
                        // a single usable key keeps being used after the backoff
                        if let Ok(next) = pool.rotate_from(&key) {
                            key = next;
                        }
                    }
                    if !delay.is_zero() {
                        tokio::select! {
                            biased;
                            _ = signal.cancelled() => return Err(ProviderError::Cancelled { provider }),
                            _ = self.clock.sleep(delay) => {}
                        }
                    }
                }
            }
        }
    }
}

fn give_up(
    provider: ProviderId,
    class: &FailureClass,
    error: TransportError,
    attempts: u32,
) -> ProviderError {
    let status = error.status();
    let message = truncate(&error.to_string(), MAX_ERROR_BODY);
    match class {
        FailureClass::RateLimited { .. } | FailureClass::Transient => ProviderError::Transient {
            provider,
            status,
            attempts,
            message,
        },
        FailureClass::CredentialRejected | FailureClass::Permanent => ProviderError::Permanent {
            provider,
            status,
            message,
        },
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push('…');
        cut
    }
}
