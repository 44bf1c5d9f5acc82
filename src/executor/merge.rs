//! Merging a parallel group's child results into one logical result.

use crate::artifact::{Artifact, GroupItem};
use crate::chain::{MergeStrategy, ParallelGroup};
use crate::error::StepError;
use crate::executor::context::ExecutionContext;

/// Apply the group's merge strategy. Children are visited in declared order,
/// whatever order they completed in.
pub fn merge_group(group: &ParallelGroup, context: &ExecutionContext) -> Result<Artifact, StepError> {
    let failed: Vec<String> = group
        .children
        .iter()
        .filter(|child| context.result(&child.id).is_none())
        .map(|child| child.id.clone())
        .collect();

    match group.merge {
        MergeStrategy::CollectAll => {
            if let Some(first) = failed.first() {
                return Err(StepError::GroupFailed {
                    message: describe_failure(context, first),
                    failed_children: failed,
                });
            }
            let items = group
                .children
                .iter()
                .filter_map(|child| {
                    context.result(&child.id).map(|result| GroupItem {
                        step_id: child.id.clone(),
                        artifact: result.artifact.clone(),
                    })
                })
                .collect();
            Ok(Artifact::Group { items })
        }
        MergeStrategy::FirstSuccess => group
            .children
            .iter()
            .find_map(|child| context.result(&child.id))
            .map(|result| result.artifact.clone())
            .ok_or_else(|| StepError::GroupFailed {
                message: format!("all {} children failed", group.children.len()),
                failed_children: failed,
            }),
    }
}

fn describe_failure(context: &ExecutionContext, step_id: &str) -> String {
    match context.failure(step_id) {
        Some(failure) => format!("child '{}' failed: {}", step_id, failure.error),
        None => format!("child '{}' produced no result", step_id),
    }
}
