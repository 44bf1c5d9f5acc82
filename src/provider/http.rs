//! Generic HTTP adapter: POST the request body as JSON to `{base_url}/{endpoint}`
//! and pull the artifact out of the common response shapes.

use crate::artifact::Artifact;
use crate::cost::Money;
use crate::credentials::Credential;
use crate::provider::{AuthScheme, ProviderId, ProviderResponse, ProviderTransport, RequestSpec, TransportError};
use crate::registry::ArtifactKind;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION, RETRY_AFTER};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const IMAGE_POINTERS: &[&str] = &["/images/0/url", "/image/url", "/output/0", "/output", "/url"];
const VIDEO_POINTERS: &[&str] = &["/video/url", "/videos/0/url", "/output", "/output/0", "/url"];
const AUDIO_POINTERS: &[&str] = &["/audio/url", "/audio_url", "/audio_file/url", "/output", "/url"];
const TEXT_POINTERS: &[&str] = &[
    "/text",
    "/output",
    "/results",
    "/choices/0/message/content",
    "/candidates/0/content/parts/0/text",
];
const COST_POINTERS: &[&str] = &["/cost", "/usage/cost", "/metrics/cost"];

#[derive(Debug, Clone)]
struct Endpoint {
    base_url: String,
    auth: AuthScheme,
}

pub struct HttpTransport {
    client: Client,
    endpoints: HashMap<ProviderId, Endpoint>,
}

impl HttpTransport {
    /// Transport using each provider's default base URL and auth scheme.
    pub fn new() -> Result<Self, TransportError> {
        let client = build_provider_http_client()?;
        let endpoints = ProviderId::ALL
            .iter()
            .map(|provider| {
                (
                    *provider,
                    Endpoint {
                        base_url: provider.default_base_url().to_string(),
                        auth: provider.default_auth(),
                    },
                )
            })
            .collect();
        Ok(Self { client, endpoints })
    }

    pub fn with_endpoint(mut self, provider: ProviderId, base_url: impl Into<String>, auth: AuthScheme) -> Self {
        self.endpoints.insert(
            provider,
            Endpoint {
                base_url: base_url.into(),
                auth,
            },
        );
        self
    }

    fn endpoint(&self, provider: ProviderId) -> Endpoint {
        self.endpoints.get(&provider).cloned().unwrap_or_else(|| Endpoint {
            base_url: provider.default_base_url().to_string(),
            auth: provider.default_auth(),
        })
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn send(
        &self,
        request: &RequestSpec,
        credential: &Credential,
    ) -> Result<ProviderResponse, TransportError> {
        let endpoint = self.endpoint(request.provider);
        let url = format!(
            "{}/{}",
            endpoint.base_url.trim_end_matches('/'),
            request.endpoint.trim_start_matches('/')
        );

        let builder = self.client.post(&url).json(&request.body);
        let builder = match &endpoint.auth {
            AuthScheme::Key => builder.header(AUTHORIZATION, format!("Key {}", credential.expose())),
            AuthScheme::Bearer => builder.bearer_auth(credential.expose()),
            AuthScheme::Header(name) => builder.header(name.as_str(), credential.expose()),
        };
        let builder = match request.provider {
            // synchronous prediction instead of a polling handle
            ProviderId::Replicate => builder.header("Prefer", "wait"),
            _ => builder,
        };

        let response = builder.send().await.map_err(map_http_error)?;
        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
                retry_after,
            });
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| TransportError::Malformed(format!("Failed to parse response: {}", e)))?;
        let artifact = extract_artifact(request.output_kind, &raw).ok_or_else(|| {
            TransportError::Malformed(format!("no {} output in response", request.output_kind))
        })?;
        let billed_cost = COST_POINTERS
            .iter()
            .find_map(|pointer| raw.pointer(pointer).and_then(Value::as_f64))
            .map(Money::from_usd);

        Ok(ProviderResponse {
            artifact,
            raw,
            billed_cost,
        })
    }
}

fn build_provider_http_client() -> Result<Client, TransportError> {
    Client::builder()
        .no_proxy()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .build()
        .map_err(|e| TransportError::Other(format!("Failed to create HTTP client: {}", e)))
}

fn map_http_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else if error.is_decode() {
        TransportError::Malformed(error.to_string())
    } else {
        TransportError::Other(format!("HTTP error: {}", error))
    }
}

/// Only the delay-seconds form is understood.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// First string found at the pointers for `kind`.
pub(crate) fn extract_artifact(kind: ArtifactKind, raw: &Value) -> Option<Artifact> {
    let pointers = match kind {
        ArtifactKind::Image => IMAGE_POINTERS,
        ArtifactKind::Video => VIDEO_POINTERS,
        ArtifactKind::Audio => AUDIO_POINTERS,
        ArtifactKind::Text => TEXT_POINTERS,
    };
    let found = pointers
        .iter()
        .find_map(|pointer| raw.pointer(pointer).and_then(Value::as_str))?;
    Some(match kind {
        ArtifactKind::Text => Artifact::text(found),
        media => Artifact::media(media, found),
    })
}
