//! Engine built from a workspace config file, talking HTTP to a mock provider.

use aicp::artifact::Artifact;
use aicp::config::ConfigLoader;
use aicp::engine::Engine;
use aicp::error::StepError;
use aicp::executor::{ExecuteOptions, RunStatus};
use aicp::progress::CollectingSink;
use aicp::provider::ProviderId;
use aicp::registry::ArtifactKind;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CAT_STILL: &str = r#"
name: cat-still
steps:
  - id: img
    type: text_to_image
    model: flux_dev
    params:
      prompt: "a cat on a windowsill"
"#;

fn write_workspace_config(root: &Path, base_url: &str, key_env: &str) {
    std::fs::write(
        root.join("aicp.toml"),
        format!(
            r#"
[retry]
max_attempts = 3
base_delay_ms = 1
max_delay_ms = 5

[executor]
max_workers = 2

[providers.fal]
base_url = "{}"
api_key_env = "{}"
timeout_secs = 5
"#,
            base_url, key_env
        ),
    )
    .unwrap();
}

#[tokio::test]
async fn configured_engine_rotates_past_rejected_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fal-ai/flux/dev"))
        .and(header("authorization", "Key revoked-key"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/fal-ai/flux/dev"))
        .and(header("authorization", "Key live-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "images": [{"url": "https://cdn.test/cat.png"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let workspace = TempDir::new().unwrap();
    std::env::set_var("AICP_IT_ROTATION_KEYS", "revoked-key, live-key");
    write_workspace_config(workspace.path(), &server.uri(), "AICP_IT_ROTATION_KEYS");

    let config = ConfigLoader::load(workspace.path()).unwrap();
    assert_eq!(config.executor.max_workers, 2);
    assert_eq!(config.provider(ProviderId::Fal).timeout, Duration::from_secs(5));
    let engine = Engine::from_config(&config).unwrap();

    let output_dir = TempDir::new().unwrap();
    let options = ExecuteOptions {
        output_dir: Some(output_dir.path().to_path_buf()),
        ..config.execute_options()
    };
    let report = engine
        .execute(CAT_STILL, options, Arc::new(CollectingSink::new()))
        .await
        .unwrap();

    assert!(report.success, "{report:?}");
    assert_eq!(
        report.outputs["img"],
        Artifact::media(ArtifactKind::Image, "https://cdn.test/cat.png")
    );
    let manifest = report.manifest.clone().unwrap();
    assert!(manifest.starts_with(output_dir.path()));
    assert!(manifest.exists());
}

#[tokio::test]
async fn missing_keys_fail_the_step_with_a_credential_error() {
    let server = MockServer::start().await;
    let workspace = TempDir::new().unwrap();
    std::env::remove_var("AICP_IT_ABSENT_KEYS");
    write_workspace_config(workspace.path(), &server.uri(), "AICP_IT_ABSENT_KEYS");

    let config = ConfigLoader::load(workspace.path()).unwrap();
    let engine = Engine::from_config(&config).unwrap();
    let report = engine
        .execute(CAT_STILL, ExecuteOptions::default(), Arc::new(CollectingSink::new()))
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    match report.cause {
        Some(StepError::Credential { provider, message }) => {
            assert_eq!(provider, ProviderId::Fal);
            assert!(message.contains("AICP_IT_ABSENT_KEYS"), "{message}");
        }
        other => panic!("expected a credential error, got {other:?}"),
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[test]
fn environment_file_overrides_workspace_file() {
    let workspace = TempDir::new().unwrap();
    write_workspace_config(workspace.path(), "http://localhost:1", "AICP_IT_UNUSED");
    std::fs::create_dir(workspace.path().join("config")).unwrap();
    std::fs::write(
        workspace.path().join("config").join("development.toml"),
        "[retry]\nmax_attempts = 6\n",
    )
    .unwrap();

    let config = ConfigLoader::load(workspace.path()).unwrap();
    assert_eq!(config.retry.max_attempts, 6);
    assert_eq!(config.retry.base_delay_ms, 1);
    assert_eq!(config.provider(ProviderId::Fal).base_url, "http://localhost:1");
}
