//! Parsing and validation against the builtin catalog.

use super::test_utils::MockTransport;
use aicp::chain::Step;
use aicp::cost::Money;
use aicp::credentials::CredentialStore;
use aicp::engine::Engine;
use aicp::error::{EngineError, ValidationError};
use aicp::provider::ProviderCaller;
use aicp::registry::ModelRegistry;
use std::sync::Arc;

fn builtin_engine() -> Engine {
    let caller = ProviderCaller::new(MockTransport::new(), Arc::new(CredentialStore::new()));
    Engine::new(Arc::new(ModelRegistry::builtin()), Arc::new(caller))
}

const PRODUCT_VIDEO: &str = r#"
name: product-video
steps:
  - id: idea
    type: prompt_generation
    model: gpt4o_prompt
    params:
      prompt: "Describe a cinematic shot of a ceramic mug"
  - id: still
    type: text_to_image
    model: flux_dev
    params:
      prompt: "$idea"
  - id: takes
    type: parallel_group
    merge_strategy: collect_all
    steps:
      - id: take_standard
        type: image_to_video
        model: kling_v2_1_standard_i2v
        params: { image: "$still", prompt: "slow orbit" }
      - id: take_pro
        type: image_to_video
        model: kling_v2_1_pro_i2v
        params: { image: "$still", prompt: "slow orbit" }
  - id: final
    type: upscale_video
    model: topaz_video_upscale
    params:
      video: "$takes.take_pro"
config:
  save_intermediates: true
  max_workers: 2
"#;

#[test]
fn multi_stage_pipeline_validates_and_estimates() {
    let engine = builtin_engine();
    assert_eq!(engine.validate(PRODUCT_VIDEO), Vec::<ValidationError>::new());

    let definition = engine.parse(PRODUCT_VIDEO).unwrap();
    assert_eq!(definition.name, "product-video");
    assert_eq!(definition.steps.len(), 4);
    assert_eq!(definition.leaf_count(), 5);
    assert_eq!(definition.settings.max_workers, Some(2));
    assert!(definition.settings.save_intermediates);
    match definition.step("takes") {
        Some(Step::Parallel(group)) => assert_eq!(group.children.len(), 2),
        other => panic!("expected a parallel group, got {other:?}"),
    }

    let estimate = engine.estimate(PRODUCT_VIDEO).unwrap();
    assert_eq!(estimate.lines.len(), 5);
    assert_eq!(
        estimate.total,
        estimate.lines.iter().map(|line| line.cost).sum::<Money>()
    );
    assert!(estimate
        .lines
        .iter()
        .filter(|line| line.group.is_some())
        .all(|line| line.group.as_deref() == Some("takes")));
}

#[test]
fn every_problem_is_reported_in_one_pass() {
    let document = r#"
name: broken
steps:
  - id: first
    type: image_to_video
    model: kling_v2_1_standard_i2v
    params: { image: "$later", prompt: "go" }
  - id: later
    type: text_to_image
    model: not_a_model
    params: { prompt: "x" }
  - id: grp
    type: parallel_group
    steps:
      - { id: one, model: flux_dev, params: { prompt: "a" } }
      - { id: two, model: esrgan, params: { image: "$one" } }
  - id: tail
    type: upscale
    model: esrgan
    params: { image: "$nowhere" }
"#;
    let engine = builtin_engine();
    let errors = engine.validate(document);

    assert!(errors.iter().any(|e| matches!(e,
        ValidationError::ForwardReference { step_id, target, .. } if step_id == "first" && target == "later")));
    assert!(errors.contains(&ValidationError::UnknownModel {
        step_id: "later".to_string(),
        model: "not_a_model".to_string(),
    }));
    assert!(errors.iter().any(|e| matches!(e,
        ValidationError::SiblingReference { step_id, target, .. } if step_id == "two" && target == "one")));
    assert!(errors.contains(&ValidationError::DanglingReference {
        step_id: "tail".to_string(),
        param: "image".to_string(),
        target: "nowhere".to_string(),
    }));

    // same input, same answer
    assert_eq!(engine.validate(document), errors);

    match engine.estimate(document) {
        Err(EngineError::Validation(reported)) => assert_eq!(reported, errors),
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn malformed_document_is_a_single_document_error() {
    let errors = builtin_engine().validate("name: [unterminated\nsteps: {");
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ValidationError::Document { .. }));
    assert_eq!(errors[0].step_id(), None);
}

#[test]
fn empty_pipeline_is_rejected() {
    let errors = builtin_engine().validate("name: nothing\nsteps: []\n");
    assert_eq!(errors, vec![ValidationError::EmptyPipeline]);
}
