//! End-to-end runs through the engine against the scripted transport.

use super::test_utils::{harness, mock_url, IMG_TO_VID};
use aicp::artifact::Artifact;
use aicp::cost::Money;
use aicp::engine::Engine;
use aicp::error::{EngineError, StepError};
use aicp::executor::{AutoDecline, ExecuteOptions, FailurePolicy, RunStatus};
use aicp::progress::{CollectingSink, ProgressEvent};
use aicp::provider::{ProviderCaller, ProviderId, ProviderResponse, TransportError};
use aicp::registry::{ArtifactKind, ModelRegistry};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn group_document(merge: &str, children: usize) -> String {
    let mut doc = format!(
        "name: fan-out\nsteps:\n  - id: variants\n    type: parallel_group\n    merge_strategy: {}\n    steps:\n",
        merge
    );
    for i in 0..children {
        let name = (b'a' + i as u8) as char;
        doc.push_str(&format!(
            "      - id: {}\n        type: text_to_image\n        model: m1\n        params: {{ text: \"variant {}\" }}\n",
            name, name
        ));
    }
    doc
}

#[tokio::test]
async fn img_to_vid_runs_in_order_and_passes_the_image() {
    let h = harness();
    let sink = Arc::new(CollectingSink::new());

    let report = h
        .engine
        .execute(IMG_TO_VID, ExecuteOptions::default(), sink.clone())
        .await
        .unwrap();

    assert!(report.success, "{report:?}");
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(h.transport.call_order(), vec!["img", "vid"]);
    assert_eq!(h.transport.calls()[1].body["image_url"], mock_url("img"));
    assert_eq!(
        report.outputs["vid"],
        Artifact::media(ArtifactKind::Video, mock_url("vid"))
    );
    assert_eq!(report.total_cost, Money::from_micros(290_000));
    assert_eq!(report.estimated_cost, report.total_cost);

    let events = sink.events();
    assert_eq!(events.first().map(|e| e.event.event_type()), Some("start"));
    assert_eq!(events.last().map(|e| e.event.event_type()), Some("complete"));
    assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));
    assert!(events.iter().all(|e| e.run_id == report.run_id));
    let completed: Vec<&str> = events
        .iter()
        .filter_map(|e| match &e.event {
            ProgressEvent::StepComplete { step_id, .. } => Some(step_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec!["img", "vid"]);
}

#[tokio::test]
async fn unknown_model_fails_before_any_call() {
    let h = harness();
    let doc = IMG_TO_VID.replace("model: m1", "model: nonexistent_key");

    let err = h
        .engine
        .execute(&doc, ExecuteOptions::default(), Arc::new(CollectingSink::new()))
        .await
        .unwrap_err();

    match err {
        EngineError::Validation(errors) => {
            assert!(errors.iter().any(|e| e.step_id() == Some("img")
                && e.to_string().contains("nonexistent_key")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(h.transport.call_count(), 0);
}

#[tokio::test]
async fn permanent_failure_fails_fast_and_names_the_step() {
    let h = harness();
    h.transport.fail_with_status("img", 422);

    let report = h
        .engine
        .execute(IMG_TO_VID, ExecuteOptions::default(), Arc::new(CollectingSink::new()))
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.failed_step_id.as_deref(), Some("img"));
    assert!(matches!(
        report.cause,
        Some(StepError::PermanentProvider {
            status: Some(422),
            ..
        })
    ));
    assert_eq!(h.transport.calls_for("vid"), 0);
    assert_eq!(h.transport.calls_for("img"), 1, "4xx is not retried");
}

#[tokio::test]
async fn continue_mode_runs_independent_steps_and_fails_dependents() {
    let h = harness();
    h.transport.fail_with_status("img", 400);
    let doc = format!(
        "{}\n  - id: voice\n    type: text_to_speech\n    model: m3\n    params:\n      text: hello\n",
        IMG_TO_VID.trim_end()
    );
    let options = ExecuteOptions {
        failure_policy: FailurePolicy::Continue,
        ..ExecuteOptions::default()
    };

    let report = h
        .engine
        .execute(&doc, options, Arc::new(CollectingSink::new()))
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.failed_step_id.as_deref(), Some("img"));
    assert_eq!(h.transport.calls_for("vid"), 0);
    assert_eq!(h.transport.calls_for("voice"), 1);
    assert!(report.outputs.contains_key("voice"));
    let vid = report.failures.iter().find(|f| f.step_id == "vid").unwrap();
    assert_eq!(
        vid.error,
        StepError::DependencyFailed {
            upstream: "img".to_string()
        }
    );
}

#[tokio::test]
async fn transient_failure_is_retried_with_backoff() {
    let h = harness();
    h.transport.fail_with_status("img", 503);

    let report = h
        .engine
        .execute(IMG_TO_VID, ExecuteOptions::default(), Arc::new(CollectingSink::new()))
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(h.transport.calls_for("img"), 2);
    assert_eq!(h.clock.sleeps(), vec![Duration::from_secs(1)]);
}

#[tokio::test]
async fn billed_cost_wins_over_estimate() {
    let h = harness();
    let mut response = ProviderResponse::new(Artifact::media(ArtifactKind::Image, mock_url("img")));
    response.billed_cost = Some(Money::from_micros(33_000));
    h.transport.script("img", Ok(response));

    let report = h
        .engine
        .execute(IMG_TO_VID, ExecuteOptions::default(), Arc::new(CollectingSink::new()))
        .await
        .unwrap();

    assert_eq!(report.result("img").unwrap().cost, Money::from_micros(33_000));
    assert_eq!(report.total_cost, Money::from_micros(283_000));
}

#[tokio::test(start_paused = true)]
async fn collect_all_merges_in_declared_order() {
    let h = harness();
    h.transport.delay("a", Duration::from_millis(300));
    h.transport.delay("b", Duration::from_millis(200));
    h.transport.delay("c", Duration::from_millis(100));

    let report = h
        .engine
        .execute(
            &group_document("collect_all", 3),
            ExecuteOptions::default(),
            Arc::new(CollectingSink::new()),
        )
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(h.transport.completion_order(), vec!["c", "b", "a"]);
    match &report.outputs["variants"] {
        Artifact::Group { items } => {
            let order: Vec<&str> = items.iter().map(|i| i.step_id.as_str()).collect();
            assert_eq!(order, vec!["a", "b", "c"]);
        }
        other => panic!("expected group artifact, got {other:?}"),
    }
    let group = report.result("variants").unwrap();
    assert!(group.is_group());
    assert_eq!(group.cost, Money::from_micros(120_000));
    assert_eq!(report.total_cost, Money::from_micros(120_000));
}

#[tokio::test(start_paused = true)]
async fn worker_bound_limits_in_flight_calls() {
    let h = harness();
    for child in ["a", "b", "c", "d", "e"] {
        h.transport.delay(child, Duration::from_millis(50));
    }
    let options = ExecuteOptions {
        max_workers: Some(2),
        ..ExecuteOptions::default()
    };

    let report = h
        .engine
        .execute(&group_document("collect_all", 5), options, Arc::new(CollectingSink::new()))
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(h.transport.call_count(), 5);
    assert_eq!(h.transport.max_in_flight(), 2);
}

#[tokio::test]
async fn collect_all_fails_the_group_when_a_child_fails() {
    let h = harness();
    h.transport.fail_with_status("b", 400);

    let report = h
        .engine
        .execute(
            &group_document("collect_all", 3),
            ExecuteOptions::default(),
            Arc::new(CollectingSink::new()),
        )
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.failed_step_id.as_deref(), Some("variants"));
    match &report.cause {
        Some(StepError::GroupFailed {
            failed_children, ..
        }) => assert!(failed_children.contains(&"b".to_string())),
        other => panic!("expected group failure, got {other:?}"),
    }
    assert!(!report.outputs.contains_key("variants"));
}

#[tokio::test]
async fn first_success_takes_first_declared_success() {
    let h = harness();
    h.transport.fail_with_status("a", 400);

    let report = h
        .engine
        .execute(
            &group_document("first_success", 3),
            ExecuteOptions::default(),
            Arc::new(CollectingSink::new()),
        )
        .await
        .unwrap();

    assert!(report.success, "{report:?}");
    assert_eq!(
        report.outputs["variants"],
        Artifact::media(ArtifactKind::Image, mock_url("b"))
    );
}

#[tokio::test(start_paused = true)]
async fn cancellation_keeps_partial_results_and_stops_calls() {
    let h = harness();
    for child in ["a", "b", "c", "d", "e"] {
        h.transport.delay(child, Duration::from_millis(100));
    }
    let options = ExecuteOptions {
        max_workers: Some(2),
        ..ExecuteOptions::default()
    };

    let handle = h
        .engine
        .spawn(&group_document("collect_all", 5), options)
        .unwrap();
    let (run_id, mut events, task) = handle.into_parts();
    assert_eq!(h.engine.active_runs(), vec![run_id.clone()]);

    let mut completed = 0;
    let mut calls_at_cancel = None;
    while let Some(envelope) = events.recv().await {
        if let ProgressEvent::StepComplete { .. } = envelope.event {
            completed += 1;
            if completed == 2 {
                h.engine.cancel(&run_id).unwrap();
                calls_at_cancel = Some(h.transport.call_count());
            }
        }
    }
    let report = task.await.unwrap().unwrap();

    assert_eq!(report.status, RunStatus::Cancelled);
    assert!(!report.success);
    assert_eq!(report.cause, Some(StepError::Cancelled));
    assert_eq!(report.step_results().count(), 2);
    assert!(report.result("variants").is_none());
    assert_eq!(Some(h.transport.call_count()), calls_at_cancel);
    assert!(h.engine.active_runs().is_empty());
    assert!(matches!(
        h.engine.cancel(&run_id),
        Err(EngineError::RunNotFound(_))
    ));
}

#[tokio::test]
async fn budget_guard_refuses_before_any_call() {
    let h = harness();
    let options = ExecuteOptions {
        max_cost: Some(Money::from_usd(0.10)),
        ..ExecuteOptions::default()
    };

    let err = h
        .engine
        .execute(IMG_TO_VID, options, Arc::new(CollectingSink::new()))
        .await
        .unwrap_err();

    match err {
        EngineError::BudgetExceeded { estimated, limit } => {
            assert_eq!(estimated, Money::from_micros(290_000));
            assert_eq!(limit, Money::from_micros(100_000));
        }
        other => panic!("expected budget error, got {other:?}"),
    }
    assert_eq!(h.transport.call_count(), 0);
}

#[tokio::test]
async fn oversized_durations_cannot_slip_past_the_budget() {
    let h = harness();
    let caller = ProviderCaller::new(h.transport.clone(), Arc::clone(&h.credentials));
    let engine = Engine::new(Arc::new(ModelRegistry::builtin()), Arc::new(caller));
    let doc = r#"
name: long-takes
steps:
  - { id: a, type: text_to_video, model: veo3, params: { prompt: "sea", duration: 8000000000000.0 } }
  - { id: b, type: text_to_video, model: veo3, params: { prompt: "sky", duration: 8000000000000.0 } }
"#;
    let options = ExecuteOptions {
        max_cost: Some(Money::from_usd(1.0)),
        ..ExecuteOptions::default()
    };

    let err = engine
        .execute(doc, options, Arc::new(CollectingSink::new()))
        .await
        .unwrap_err();

    match err {
        EngineError::Validation(errors) => {
            assert!(errors.iter().any(|e| e.step_id() == Some("b")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(matches!(engine.estimate(doc), Err(EngineError::Validation(_))));
    assert_eq!(h.transport.call_count(), 0);
}

#[tokio::test]
async fn declined_confirmation_cancels_without_calls() {
    let h = harness();
    let engine = h.engine.with_gate(Arc::new(AutoDecline));
    let options = ExecuteOptions {
        confirm: true,
        ..ExecuteOptions::default()
    };

    let report = engine
        .execute(IMG_TO_VID, options, Arc::new(CollectingSink::new()))
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Cancelled);
    assert!(report.results.is_empty());
    assert_eq!(h.transport.call_count(), 0);
}

#[tokio::test]
async fn manifest_and_intermediates_are_written() {
    let h = harness();
    let out = TempDir::new().unwrap();
    let doc = format!("{}config:\n  save_intermediates: true\n", IMG_TO_VID);
    let options = ExecuteOptions {
        output_dir: Some(out.path().to_path_buf()),
        ..ExecuteOptions::default()
    };

    let report = h
        .engine
        .execute(&doc, options, Arc::new(CollectingSink::new()))
        .await
        .unwrap();

    let run_dir = out.path().join(&report.run_id);
    assert_eq!(report.manifest, Some(run_dir.join("manifest.json")));
    let manifest: serde_json::Value =
        serde_json::from_slice(&std::fs::read(run_dir.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest["status"], "completed");
    assert_eq!(manifest["outputs"]["img"]["url"], mock_url("img"));

    let step: serde_json::Value =
        serde_json::from_slice(&std::fs::read(run_dir.join("img.json")).unwrap()).unwrap();
    assert_eq!(step["step_id"], "img");
    assert_eq!(step["response"]["step"], "img");
}

#[tokio::test]
async fn timeout_counts_as_transient() {
    let h = harness();
    h.transport.script("img", Err(TransportError::Timeout));
    h.transport.script("img", Err(TransportError::Timeout));
    h.transport.script("img", Err(TransportError::Timeout));

    let report = h
        .engine
        .execute(IMG_TO_VID, ExecuteOptions::default(), Arc::new(CollectingSink::new()))
        .await
        .unwrap();

    assert_eq!(report.failed_step_id.as_deref(), Some("img"));
    assert!(matches!(
        report.cause,
        Some(StepError::TransientProvider { attempts: 3, .. })
    ));
    assert_eq!(h.clock.sleeps().len(), 2);
    // timeouts never blacklist the key
    assert_eq!(h.credentials.pool(ProviderId::Fal).unwrap().available(), 1);
}
