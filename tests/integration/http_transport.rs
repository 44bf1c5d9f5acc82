//! HTTP adapter against a local mock server.

use super::test_utils::fal_store;
use aicp::artifact::Artifact;
use aicp::cancel::CancellationSignal;
use aicp::cost::Money;
use aicp::credentials::Credential;
use aicp::provider::{
    AuthScheme, HttpTransport, InstantClock, ProviderCaller, ProviderId, ProviderTransport, RequestSpec,
    TransportError,
};
use aicp::registry::ArtifactKind;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(provider: ProviderId, endpoint: &str, kind: ArtifactKind) -> RequestSpec {
    RequestSpec {
        step_id: "img".to_string(),
        model: "flux_dev".to_string(),
        provider,
        endpoint: endpoint.to_string(),
        body: json!({"prompt": "a cat"}),
        output_kind: kind,
    }
}

fn transport_for(server: &MockServer, provider: ProviderId) -> HttpTransport {
    HttpTransport::new()
        .unwrap()
        .with_endpoint(provider, server.uri(), provider.default_auth())
}

#[tokio::test]
async fn fal_request_uses_key_auth_and_extracts_image() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fal-ai/flux/dev"))
        .and(header("authorization", "Key secret-1"))
        .and(body_json(json!({"prompt": "a cat"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "images": [{"url": "https://cdn.test/cat.png", "width": 1024}],
            "cost": 0.025
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = transport_for(&server, ProviderId::Fal)
        .send(
            &request(ProviderId::Fal, "fal-ai/flux/dev", ArtifactKind::Image),
            &Credential::new("secret-1"),
        )
        .await
        .unwrap();

    assert_eq!(
        response.artifact,
        Artifact::media(ArtifactKind::Image, "https://cdn.test/cat.png")
    );
    assert_eq!(response.billed_cost, Some(Money::from_micros(25_000)));
    assert_eq!(response.raw["images"][0]["width"], 1024);
}

#[tokio::test]
async fn replicate_waits_synchronously_with_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/owner/model/predictions"))
        .and(header("authorization", "Bearer r8-token"))
        .and(header("prefer", "wait"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "status": "succeeded",
            "output": "https://replicate.test/out.mp4"
        })))
        .mount(&server)
        .await;

    let response = transport_for(&server, ProviderId::Replicate)
        .send(
            &request(
                ProviderId::Replicate,
                "/models/owner/model/predictions",
                ArtifactKind::Video,
            ),
            &Credential::new("r8-token"),
        )
        .await
        .unwrap();

    assert_eq!(
        response.artifact,
        Artifact::media(ArtifactKind::Video, "https://replicate.test/out.mp4")
    );
    assert_eq!(response.billed_cost, None);
}

#[tokio::test]
async fn custom_header_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/voice"))
        .and(header("xi-api-key", "el-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "audio_url": "https://el.test/a.mp3"
        })))
        .mount(&server)
        .await;

    let transport = HttpTransport::new().unwrap().with_endpoint(
        ProviderId::ElevenLabs,
        format!("{}/", server.uri()),
        AuthScheme::Header("xi-api-key".to_string()),
    );
    let response = transport
        .send(
            &request(ProviderId::ElevenLabs, "v1/text-to-speech/voice", ArtifactKind::Audio),
            &Credential::new("el-key"),
        )
        .await
        .unwrap();

    assert_eq!(
        response.artifact,
        Artifact::media(ArtifactKind::Audio, "https://el.test/a.mp3")
    );
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_string("too many requests"),
        )
        .mount(&server)
        .await;

    let err = transport_for(&server, ProviderId::Fal)
        .send(
            &request(ProviderId::Fal, "fal-ai/flux/dev", ArtifactKind::Image),
            &Credential::new("k"),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TransportError::Status {
            status: 429,
            body: "too many requests".to_string(),
            retry_after: Some(Duration::from_secs(7)),
        }
    );
}

#[tokio::test]
async fn response_without_output_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "queued"})))
        .mount(&server)
        .await;

    let err = transport_for(&server, ProviderId::Fal)
        .send(
            &request(ProviderId::Fal, "fal-ai/kling", ArtifactKind::Video),
            &Credential::new("k"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Malformed(_)));
}

#[tokio::test]
async fn caller_recovers_from_service_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image": {"url": "https://cdn.test/retry.png"}
        })))
        .mount(&server)
        .await;

    let clock = Arc::new(InstantClock::new());
    let caller = ProviderCaller::new(
        Arc::new(transport_for(&server, ProviderId::Fal)),
        fal_store(&["fal-key"]),
    )
    .with_clock(clock.clone());

    let response = caller
        .call(
            &request(ProviderId::Fal, "fal-ai/flux/dev", ArtifactKind::Image),
            &CancellationSignal::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.artifact,
        Artifact::media(ArtifactKind::Image, "https://cdn.test/retry.png")
    );
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(1)]);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
