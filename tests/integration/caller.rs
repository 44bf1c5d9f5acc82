//! Provider caller behaviour: backoff, key rotation, cancellation.

use super::test_utils::{fal_store, scenario_registry, status_error, MockTransport};
use aicp::artifact::Artifact;
use aicp::cancel::CancellationSignal;
use aicp::credentials::{Credential, CredentialStore};
use aicp::error::{CredentialError, ProviderError};
use aicp::provider::{
    build_request, InstantClock, ProviderCaller, ProviderId, ProviderResponse, ProviderTransport,
    RequestSpec, TransportError,
};
use aicp::registry::ArtifactKind;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map};
use std::sync::Arc;
use std::time::Duration;

fn image_request(step_id: &str) -> RequestSpec {
    let registry = scenario_registry();
    let model = registry.lookup("m1").unwrap();
    let mut params = Map::new();
    params.insert("text".to_string(), json!("a cat"));
    build_request(step_id, &model, params)
}

fn caller(
    transport: &Arc<MockTransport>,
    credentials: Arc<CredentialStore>,
) -> (ProviderCaller, Arc<InstantClock>) {
    let clock = Arc::new(InstantClock::new());
    let caller = ProviderCaller::new(transport.clone(), credentials).with_clock(clock.clone());
    (caller, clock)
}

fn rate_limited(retry_after: Option<Duration>) -> TransportError {
    TransportError::Status {
        status: 429,
        body: "slow down".to_string(),
        retry_after,
    }
}

fn keys_used(transport: &MockTransport) -> Vec<String> {
    transport.calls().into_iter().map(|c| c.key).collect()
}

#[tokio::test]
async fn rate_limit_backs_off_then_gives_up() {
    let transport = MockTransport::new();
    for _ in 0..3 {
        transport.script("img", Err(rate_limited(None)));
    }
    let (caller, clock) = caller(&transport, fal_store(&["only-key"]));

    let err = caller
        .call(&image_request("img"), &CancellationSignal::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProviderError::Transient {
            status: Some(429),
            attempts: 3,
            ..
        }
    ));
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
    assert_eq!(keys_used(&transport), vec!["only-key"; 3]);
}

#[tokio::test]
async fn rate_limit_rotates_to_next_key() {
    let transport = MockTransport::new();
    transport.script("img", Err(rate_limited(None)));
    let (caller, _clock) = caller(&transport, fal_store(&["key-a", "key-b"]));

    caller
        .call(&image_request("img"), &CancellationSignal::new())
        .await
        .unwrap();

    assert_eq!(keys_used(&transport), vec!["key-a", "key-b"]);
}

#[tokio::test]
async fn retry_after_overrides_backoff() {
    let transport = MockTransport::new();
    transport.script("img", Err(rate_limited(Some(Duration::from_secs(5)))));
    transport.script("img", Err(rate_limited(Some(Duration::from_secs(600)))));
    let (caller, clock) = caller(&transport, fal_store(&["only-key"]));

    caller
        .call(&image_request("img"), &CancellationSignal::new())
        .await
        .unwrap();

    // capped at the policy's max delay
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(5), Duration::from_secs(30)]
    );
}

#[tokio::test]
async fn rejected_key_is_blacklisted_and_skipped() {
    let transport = MockTransport::new();
    transport.fail_with_status("img", 401);
    let credentials = fal_store(&["bad-key", "good-key"]);
    let (caller, clock) = caller(&transport, Arc::clone(&credentials));

    caller
        .call(&image_request("img"), &CancellationSignal::new())
        .await
        .unwrap();
    caller
        .call(&image_request("img2"), &CancellationSignal::new())
        .await
        .unwrap();

    assert_eq!(keys_used(&transport), vec!["bad-key", "good-key", "good-key"]);
    assert!(clock.sleeps().is_empty(), "rotation on 401 does not wait");
    assert_eq!(credentials.pool(ProviderId::Fal).unwrap().available(), 1);
}

/// Rejects one key after a short delay and accepts every other key.
struct RevokedKeyTransport {
    revoked: &'static str,
    keys: Mutex<Vec<String>>,
}

#[async_trait]
impl ProviderTransport for RevokedKeyTransport {
    async fn send(
        &self,
        _request: &RequestSpec,
        credential: &Credential,
    ) -> Result<ProviderResponse, TransportError> {
        self.keys.lock().push(credential.expose().to_string());
        if credential.expose() == self.revoked {
            tokio::time::sleep(Duration::from_millis(10)).await;
            return Err(status_error(401));
        }
        Ok(ProviderResponse::new(Artifact::media(
            ArtifactKind::Image,
            "https://cdn.test/ok.png",
        )))
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_rejections_of_one_key_share_the_survivor() {
    let transport = Arc::new(RevokedKeyTransport {
        revoked: "revoked-key-0001",
        keys: Mutex::new(Vec::new()),
    });
    let credentials = fal_store(&["revoked-key-0001", "good-key-00002"]);
    let caller = ProviderCaller::new(transport.clone(), Arc::clone(&credentials))
        .with_clock(Arc::new(InstantClock::new()));
    let signal = CancellationSignal::new();
    let (first, second) = (image_request("a"), image_request("b"));

    let (a, b) = tokio::join!(caller.call(&first, &signal), caller.call(&second, &signal));

    assert!(a.is_ok(), "{a:?}");
    assert!(b.is_ok(), "{b:?}");
    assert_eq!(credentials.pool(ProviderId::Fal).unwrap().available(), 1);
    let keys = transport.keys.lock().clone();
    assert_eq!(
        keys,
        vec![
            "revoked-key-0001",
            "revoked-key-0001",
            "good-key-00002",
            "good-key-00002"
        ]
    );
}

#[tokio::test]
async fn all_keys_rejected_exhausts_the_pool() {
    let transport = MockTransport::new();
    transport.fail_with_status("img", 403);
    transport.fail_with_status("img", 403);
    let (caller, _clock) = caller(&transport, fal_store(&["key-a", "key-b"]));

    let err = caller
        .call(&image_request("img"), &CancellationSignal::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ProviderError::Credential(CredentialError::Exhausted {
            provider: ProviderId::Fal
        })
    );
    assert_eq!(transport.call_count(), 2);

    let err = caller
        .call(&image_request("again"), &CancellationSignal::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProviderError::Credential(CredentialError::Exhausted { .. })
    ));
    assert_eq!(transport.call_count(), 2, "no call without a usable key");
}

#[tokio::test]
async fn missing_credentials_fail_without_calling() {
    let transport = MockTransport::new();
    let (caller, _clock) = caller(&transport, Arc::new(CredentialStore::new()));

    let err = caller
        .call(&image_request("img"), &CancellationSignal::new())
        .await
        .unwrap_err();

    match err {
        ProviderError::Credential(CredentialError::NotConfigured { provider, env_var }) => {
            assert_eq!(provider, ProviderId::Fal);
            assert_eq!(env_var, "FAL_KEY");
        }
        other => panic!("expected not configured, got {other:?}"),
    }
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn permanent_error_is_not_retried() {
    let transport = MockTransport::new();
    transport.fail_with_status("img", 400);
    let (caller, clock) = caller(&transport, fal_store(&["only-key"]));

    let err = caller
        .call(&image_request("img"), &CancellationSignal::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert!(matches!(err, ProviderError::Permanent { .. }));
    assert_eq!(transport.call_count(), 1);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff_stops_retrying() {
    let transport = MockTransport::new();
    transport.fail_with_status("img", 503);
    // real tokio clock, paused
    let caller = Arc::new(ProviderCaller::new(transport.clone(), fal_store(&["only-key"])));
    let signal = CancellationSignal::new();

    let task = {
        let caller = Arc::clone(&caller);
        let signal = signal.clone();
        tokio::spawn(async move { caller.call(&image_request("img"), &signal).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    signal.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_aborts_in_flight_call() {
    let transport = MockTransport::new();
    transport.delay("img", Duration::from_secs(60));
    let caller = Arc::new(ProviderCaller::new(transport.clone(), fal_store(&["only-key"])));
    let signal = CancellationSignal::new();

    let task = {
        let caller = Arc::clone(&caller);
        let signal = signal.clone();
        tokio::spawn(async move { caller.call(&image_request("img"), &signal).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    signal.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(
        err,
        ProviderError::Cancelled {
            provider: ProviderId::Fal
        }
    );
    assert!(transport.completion_order().is_empty());
}
