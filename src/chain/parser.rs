//! Chain Parser
//!
//! Two passes over the raw document. The first assigns ids and records every
//! name (ids and output aliases) so that a reference to a later step can be
//! told apart from a reference to nothing. The second walks the steps in
//! order with a growing scope of names that are visible, resolving models,
//! checking parameters and binding references. Every problem is collected;
//! a definition is only produced when there are none.

use crate::chain::definition::{
    MergeStrategy, ParallelGroup, PipelineDefinition, PipelineSettings, SingleStep, Step,
};
use crate::chain::document::{load_document, RawPipeline, RawStep};
use crate::chain::reference::{self, is_identifier, Reference};
use crate::error::ValidationError;
use crate::registry::{ArtifactKind, ModelCategory, ModelRegistry, ParamKind};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

const DEFAULT_PIPELINE_NAME: &str = "pipeline";

/// What a visible name yields when referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Produces {
    Kind(ArtifactKind),
    /// Collected outputs of a parallel group.
    List,
    /// Unknown or mixed kinds; not checked.
    Unchecked,
}

impl Produces {
    fn describe(self) -> String {
        match self {
            Produces::Kind(kind) => kind.to_string(),
            Produces::List => "a list".to_string(),
            Produces::Unchecked => "unknown output".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Target {
    step_id: String,
    produces: Produces,
    /// For groups: (child id, child alias, child output).
    children: Vec<(String, Option<String>, Produces)>,
}

#[derive(Debug, Default)]
struct Scope {
    names: HashMap<String, Target>,
}

impl Scope {
    fn insert(&mut self, id: &str, alias: Option<&str>, target: Target) {
        if let Some(alias) = alias {
            self.names.insert(alias.to_string(), target.clone());
        }
        self.names.insert(id.to_string(), target);
    }
}

/// The group a child step is being checked in.
struct GroupContext<'a> {
    id: &'a str,
    alias: Option<&'a str>,
    siblings: HashSet<&'a str>,
}

impl GroupContext<'_> {
    fn contains(&self, name: &str) -> bool {
        name == self.id || self.alias == Some(name) || self.siblings.contains(name)
    }
}

struct StepIds {
    id: String,
    children: Vec<String>,
}

pub struct ChainParser {
    registry: Arc<ModelRegistry>,
}

impl ChainParser {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Parse and validate a YAML or JSON document.
    pub fn parse(&self, text: &str) -> Result<PipelineDefinition, Vec<ValidationError>> {
        let raw = load_document(text).map_err(|e| vec![e])?;
        self.parse_raw(&raw)
    }

    pub fn parse_raw(&self, raw: &RawPipeline) -> Result<PipelineDefinition, Vec<ValidationError>> {
        let mut errors = Vec::new();

        if raw.steps.is_empty() {
            errors.push(ValidationError::EmptyPipeline);
        }
        if raw.config.max_workers == Some(0) {
            errors.push(ValidationError::InvalidConfig {
                message: "max_workers must be at least 1".to_string(),
            });
        }

        let ids = assign_ids(&raw.steps);
        let declared = declare_names(&raw.steps, &ids, &mut errors);

        let mut scope = Scope::default();
        let mut steps = Vec::with_capacity(raw.steps.len());

        for (raw_step, step_ids) in raw.steps.iter().zip(&ids) {
            if raw_step.is_group() {
                let target = self.group_target(raw_step, step_ids);
                if let Some(group) = self.parse_group(raw_step, step_ids, &scope, &declared, &mut errors) {
                    steps.push(Step::Parallel(group));
                }
                for ((child, child_id), (_, _, produces)) in raw_step
                    .steps
                    .iter()
                    .zip(&step_ids.children)
                    .zip(&target.children)
                {
                    scope.insert(
                        child_id,
                        child.output.as_deref(),
                        Target {
                            step_id: child_id.clone(),
                            produces: *produces,
                            children: Vec::new(),
                        },
                    );
                }
                scope.insert(&step_ids.id, raw_step.output.as_deref(), target);
            } else {
                if let Some(step) = self.parse_single(raw_step, &step_ids.id, &scope, &declared, None, &mut errors) {
                    steps.push(Step::Single(step));
                }
                scope.insert(
                    &step_ids.id,
                    raw_step.output.as_deref(),
                    Target {
                        step_id: step_ids.id.clone(),
                        produces: self.produces(raw_step),
                        children: Vec::new(),
                    },
                );
            }
        }

        if !errors.is_empty() {
            tracing::debug!(errors = errors.len(), "Pipeline failed validation");
            return Err(errors);
        }

        let name = raw
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_PIPELINE_NAME.to_string());
        tracing::debug!(pipeline = %name, steps = steps.len(), "Pipeline validated");

        Ok(PipelineDefinition {
            name,
            description: raw.description.clone(),
            steps,
            settings: PipelineSettings {
                output_dir: raw.config.output_dir.clone(),
                save_intermediates: raw.config.save_intermediates,
                max_workers: raw.config.max_workers,
                parallel_enabled: raw.config.parallel_enabled,
            },
        })
    }

    /// Output of a single raw step, judged from its model or declared type.
    fn produces(&self, raw: &RawStep) -> Produces {
        let category = raw
            .model
            .as_deref()
            .and_then(|key| self.registry.lookup(key))
            .map(|model| model.category)
            .or_else(|| raw.step_type.as_deref().and_then(|t| t.parse::<ModelCategory>().ok()));
        match category {
            Some(category) => Produces::Kind(category.output_kind()),
            None => Produces::Unchecked,
        }
    }

    fn group_target(&self, raw: &RawStep, ids: &StepIds) -> Target {
        let children: Vec<(String, Option<String>, Produces)> = raw
            .steps
            .iter()
            .zip(&ids.children)
            .map(|(child, id)| (id.clone(), child.output.clone(), self.produces(child)))
            .collect();
        let merge = raw
            .merge_strategy
            .as_deref()
            .and_then(|s| s.parse::<MergeStrategy>().ok())
            .unwrap_or_default();
        let produces = match merge {
            MergeStrategy::CollectAll => Produces::List,
            MergeStrategy::FirstSuccess => {
                let mut kinds = children.iter().map(|(_, _, p)| *p);
                match kinds.next() {
                    Some(first) if kinds.all(|p| p == first) => first,
                    _ => Produces::Unchecked,
                }
            }
        };
        Target {
            step_id: ids.id.clone(),
            produces,
            children,
        }
    }

    fn parse_group(
        &self,
        raw: &RawStep,
        ids: &StepIds,
        scope: &Scope,
        declared: &HashMap<String, String>,
        errors: &mut Vec<ValidationError>,
    ) -> Option<ParallelGroup> {
        let before = errors.len();

        let merge = match raw.merge_strategy.as_deref() {
            None => MergeStrategy::default(),
            Some(value) => value.parse::<MergeStrategy>().unwrap_or_else(|_| {
                errors.push(ValidationError::UnknownMergeStrategy {
                    step_id: ids.id.clone(),
                    value: value.to_string(),
                });
                MergeStrategy::default()
            }),
        };

        if raw.steps.is_empty() {
            errors.push(ValidationError::EmptyGroup {
                step_id: ids.id.clone(),
            });
        }

        let mut siblings: HashSet<&str> = ids.children.iter().map(String::as_str).collect();
        siblings.extend(raw.steps.iter().filter_map(|c| c.output.as_deref()));
        let context = GroupContext {
            id: &ids.id,
            alias: raw.output.as_deref(),
            siblings,
        };

        let mut children = Vec::with_capacity(raw.steps.len());
        for (child, child_id) in raw.steps.iter().zip(&ids.children) {
            if child.is_group() {
                errors.push(ValidationError::NestedGroup {
                    step_id: child_id.clone(),
                });
                continue;
            }
            if let Some(step) = self.parse_single(child, child_id, scope, declared, Some(&context), errors) {
                children.push(step);
            }
        }

        if errors.len() > before {
            return None;
        }
        Some(ParallelGroup {
            id: ids.id.clone(),
            output: raw.output.clone(),
            merge,
            children,
        })
    }

    fn parse_single(
        &self,
        raw: &RawStep,
        id: &str,
        scope: &Scope,
        declared: &HashMap<String, String>,
        group: Option<&GroupContext<'_>>,
        errors: &mut Vec<ValidationError>,
    ) -> Option<SingleStep> {
        let before = errors.len();

        let declared_category = match raw.step_type.as_deref() {
            None => None,
            Some(value) => match value.parse::<ModelCategory>() {
                Ok(category) => Some(category),
                Err(_) => {
                    errors.push(ValidationError::UnknownCategory {
                        step_id: id.to_string(),
                        value: value.to_string(),
                    });
                    None
                }
            },
        };

        let model = match raw.model.as_deref() {
            None => {
                errors.push(ValidationError::MissingModel {
                    step_id: id.to_string(),
                });
                None
            }
            Some(key) => {
                let found = self.registry.lookup(key);
                if found.is_none() {
                    errors.push(ValidationError::UnknownModel {
                        step_id: id.to_string(),
                        model: key.to_string(),
                    });
                }
                found
            }
        };

        if let (Some(declared), Some(model)) = (declared_category, &model) {
            if declared != model.category {
                errors.push(ValidationError::CategoryMismatch {
                    step_id: id.to_string(),
                    model: model.key.to_string(),
                    declared: declared.to_string(),
                    actual: model.category.to_string(),
                });
            }
        }

        let mut bindings = BTreeMap::new();
        for (param, value) in &raw.params {
            let whole = reference::whole_reference(value);
            let mut references = reference::scan(value);
            references.sort();
            references.dedup();
            for reference in references {
                match resolve(&reference, param, id, scope, declared, group) {
                    Ok((step_id, produces)) => {
                        if let (Some(model), true) = (&model, whole.as_ref() == Some(&reference)) {
                            if let Some(spec) = model.param(param) {
                                if let Some(err) = kind_mismatch(id, param, &reference, spec.kind, produces) {
                                    errors.push(err);
                                }
                            }
                        }
                        bindings.insert(reference.target(), step_id);
                    }
                    Err(err) => errors.push(err),
                }
            }
        }

        if let Some(model) = &model {
            for spec in &model.params {
                match raw.params.get(spec.name) {
                    None | Some(serde_json::Value::Null) => {
                        if spec.required {
                            errors.push(ValidationError::MissingParameter {
                                step_id: id.to_string(),
                                param: spec.name.to_string(),
                            });
                        }
                    }
                    Some(value) if !reference::contains_reference(value) => {
                        if let Err(reason) = spec.kind.check_literal(value) {
                            errors.push(ValidationError::InvalidParameter {
                                step_id: id.to_string(),
                                param: spec.name.to_string(),
                                reason,
                            });
                        }
                    }
                    Some(_) => {}
                }
            }
            for param in raw.params.keys() {
                if model.param(param).is_none() {
                    tracing::warn!(
                        step = id,
                        model = model.key,
                        param = %param,
                        "Parameter is not in the model schema; passing it through"
                    );
                }
            }
        }

        if errors.len() > before {
            return None;
        }
        let model = model?;
        Some(SingleStep {
            id: id.to_string(),
            output: raw.output.clone(),
            model,
            params: raw.params.clone(),
            bindings,
        })
    }
}

/// Ids for every step: explicit ones, else `step_<n>` (1-based), and
/// `<group>_<k>` for group children.
fn assign_ids(steps: &[RawStep]) -> Vec<StepIds> {
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let id = step
                .id
                .clone()
                .unwrap_or_else(|| format!("step_{}", index + 1));
            let children = step
                .steps
                .iter()
                .enumerate()
                .map(|(k, child)| child.id.clone().unwrap_or_else(|| format!("{}_{}", id, k + 1)))
                .collect();
            StepIds { id, children }
        })
        .collect()
}

/// Record every id and alias, reporting invalid and duplicate names.
/// Returns name -> owning step id.
fn declare_names(
    steps: &[RawStep],
    ids: &[StepIds],
    errors: &mut Vec<ValidationError>,
) -> HashMap<String, String> {
    let mut declared: HashMap<String, String> = HashMap::new();
    let mut declare = |name: &str, owner: &str, errors: &mut Vec<ValidationError>| {
        if !is_identifier(name) {
            errors.push(ValidationError::InvalidStepId {
                step_id: name.to_string(),
            });
            return;
        }
        if declared.contains_key(name) {
            errors.push(ValidationError::DuplicateName {
                step_id: owner.to_string(),
                name: name.to_string(),
            });
            return;
        }
        declared.insert(name.to_string(), owner.to_string());
    };

    for (step, step_ids) in steps.iter().zip(ids) {
        declare(&step_ids.id, &step_ids.id, errors);
        if let Some(alias) = step.output.as_deref() {
            if alias != step_ids.id {
                declare(alias, &step_ids.id, errors);
            }
        }
        if step.is_group() {
            for (child, child_id) in step.steps.iter().zip(&step_ids.children) {
                declare(child_id, child_id, errors);
                if let Some(alias) = child.output.as_deref() {
                    if alias != child_id {
                        declare(alias, child_id, errors);
                    }
                }
            }
        }
    }
    declared
}

fn resolve(
    reference: &Reference,
    param: &str,
    step_id: &str,
    scope: &Scope,
    declared: &HashMap<String, String>,
    group: Option<&GroupContext<'_>>,
) -> Result<(String, Produces), ValidationError> {
    let error_fields = || (step_id.to_string(), param.to_string(), reference.target());

    if group.map_or(false, |g| g.contains(&reference.name)) {
        let (step_id, param, target) = error_fields();
        return Err(ValidationError::SiblingReference {
            step_id,
            param,
            target,
        });
    }

    let Some(target) = scope.names.get(&reference.name) else {
        let (step_id, param, target) = error_fields();
        return Err(if declared.contains_key(&reference.name) {
            ValidationError::ForwardReference {
                step_id,
                param,
                target,
            }
        } else {
            ValidationError::DanglingReference {
                step_id,
                param,
                target,
            }
        });
    };

    match &reference.child {
        None => Ok((target.step_id.clone(), target.produces)),
        Some(child) => target
            .children
            .iter()
            .find(|(id, alias, _)| id == child || alias.as_deref() == Some(child.as_str()))
            .map(|(id, _, produces)| (id.clone(), *produces))
            .ok_or_else(|| {
                let (step_id, param, target) = error_fields();
                ValidationError::DanglingReference {
                    step_id,
                    param,
                    target,
                }
            }),
    }
}

fn kind_mismatch(
    step_id: &str,
    param: &str,
    reference: &Reference,
    expected: ParamKind,
    produces: Produces,
) -> Option<ValidationError> {
    let accepted = match produces {
        Produces::Kind(kind) => expected.accepts(kind),
        Produces::List => expected == ParamKind::Json,
        Produces::Unchecked => true,
    };
    if accepted {
        return None;
    }
    Some(ValidationError::ReferenceKindMismatch {
        step_id: step_id.to_string(),
        param: param.to_string(),
        target: reference.target(),
        expected: expected.to_string(),
        actual: produces.describe(),
    })
}
