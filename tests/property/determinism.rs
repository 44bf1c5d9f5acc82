//! Property-based tests for parse and estimate determinism

use aicp::chain::ChainParser;
use aicp::cost::{CostCalculator, Money};
use aicp::registry::ModelRegistry;
use proptest::prelude::*;
use std::sync::Arc;

const IMAGE_MODELS: &[&str] = &["flux_dev", "flux_schnell", "flux_pro", "imagen4"];

/// (model index, image count, prompt); one entry per leaf.
type Leaf = (usize, u32, String);

fn leaf_strategy() -> impl Strategy<Value = Leaf> {
    (0..IMAGE_MODELS.len(), 1u32..5, "[a-z]{1,12}( [a-z]{1,8}){0,3}")
}

/// Top-level steps: a single leaf, or a group of up to three leaves.
fn pipeline_strategy() -> impl Strategy<Value = Vec<Vec<Leaf>>> {
    prop::collection::vec(prop::collection::vec(leaf_strategy(), 1..4), 1..6)
}

fn leaf_yaml(indent: &str, id: &str, (model, images, prompt): &Leaf) -> String {
    format!(
        "{indent}- id: {id}\n{indent}  type: text_to_image\n{indent}  model: {}\n{indent}  params:\n{indent}    prompt: \"{}\"\n{indent}    num_images: {}\n",
        IMAGE_MODELS[*model], prompt, images
    )
}

fn render(steps: &[Vec<Leaf>]) -> String {
    let mut doc = String::from("name: generated\nsteps:\n");
    for (i, leaves) in steps.iter().enumerate() {
        if leaves.len() == 1 {
            doc.push_str(&leaf_yaml("  ", &format!("s{}", i), &leaves[0]));
        } else {
            doc.push_str(&format!(
                "  - id: g{}\n    type: parallel_group\n    steps:\n",
                i
            ));
            for (j, leaf) in leaves.iter().enumerate() {
                doc.push_str(&leaf_yaml("      ", &format!("g{}_{}", i, j), leaf));
            }
        }
    }
    doc
}

/// Parsing the same document twice gives the same definition
#[test]
fn test_parse_is_idempotent() {
    let registry = Arc::new(ModelRegistry::builtin());
    let parser = ChainParser::new(Arc::clone(&registry));
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&pipeline_strategy(), |steps| {
            let doc = render(&steps);
            let first = parser.parse(&doc).unwrap();
            let second = parser.parse(&doc).unwrap();
            assert_eq!(first, second);
            assert_eq!(
                first.leaf_count(),
                steps.iter().map(Vec::len).sum::<usize>()
            );
            Ok(())
        })
        .unwrap();
}

/// Estimates are repeatable and the total is the sum of the lines
#[test]
fn test_estimate_is_deterministic() {
    let registry = Arc::new(ModelRegistry::builtin());
    let parser = ChainParser::new(Arc::clone(&registry));
    let calculator = CostCalculator::new(Arc::clone(&registry));
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&pipeline_strategy(), |steps| {
            let definition = parser.parse(&render(&steps)).unwrap();
            let first = calculator.estimate_pipeline(&definition).unwrap();
            let second = calculator.estimate_pipeline(&definition).unwrap();

            assert_eq!(first, second);
            assert_eq!(first.lines.len(), definition.leaf_count());
            assert_eq!(
                first.total,
                first.lines.iter().map(|line| line.cost).sum::<Money>()
            );
            assert!(first.total >= Money::ZERO);
            Ok(())
        })
        .unwrap();
}

/// Validation errors come back identical on every pass, valid or not
#[test]
fn test_validation_errors_are_stable() {
    let parser = ChainParser::new(Arc::new(ModelRegistry::builtin()));
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &prop::collection::vec(("[a-z0-9_-]{0,6}", "\\$[a-z]{1,4}"), 1..6),
            |steps| {
                let mut doc = String::from("name: messy\nsteps:\n");
                for (id, reference) in &steps {
                    doc.push_str(&format!(
                        "  - id: \"{}\"\n    type: upscale\n    model: esrgan\n    params:\n      image: \"{}\"\n",
                        id, reference
                    ));
                }
                let first = parser.parse(&doc).err();
                let second = parser.parse(&doc).err();
                assert_eq!(first, second);
                Ok(())
            },
        )
        .unwrap();
}
