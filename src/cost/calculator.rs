//! Pre-flight cost estimation over a validated pipeline.

use crate::chain::definition::{PipelineDefinition, SingleStep, Step};
use crate::cost::formula::FormulaValue;
use crate::cost::money::Money;
use crate::error::ValidationError;
use crate::provider::ProviderId;
use crate::registry::ModelRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// One leaf step's share of an estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLine {
    pub step_id: String,
    /// Enclosing parallel group, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub model: String,
    pub provider: ProviderId,
    pub cost: Money,
    #[serde(default)]
    pub approximate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub pipeline: String,
    pub lines: Vec<CostLine>,
    pub total: Money,
}

impl CostEstimate {
    /// True when any line used an assumed input.
    pub fn is_approximate(&self) -> bool {
        self.lines.iter().any(|line| line.approximate)
    }

    /// Cost of a step; for a parallel group, the sum of its children.
    pub fn step_cost(&self, step_id: &str) -> Option<Money> {
        let lines: Vec<&CostLine> = self
            .lines
            .iter()
            .filter(|line| line.step_id == step_id || line.group.as_deref() == Some(step_id))
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.iter().map(|line| line.cost).sum())
        }
    }
}

pub struct CostCalculator {
    registry: Arc<ModelRegistry>,
}

impl CostCalculator {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    /// Evaluate one step's formula against its parameters.
    pub fn estimate_step(&self, step: &SingleStep) -> Result<FormulaValue, ValidationError> {
        step.model.cost.evaluate(&step.id, &step.params)
    }

    /// Price a model directly, outside of any pipeline.
    pub fn estimate_model(
        &self,
        model_key: &str,
        params: &Map<String, Value>,
    ) -> Result<Money, ValidationError> {
        let model = self
            .registry
            .lookup(model_key)
            .ok_or_else(|| ValidationError::UnknownModel {
                step_id: model_key.to_string(),
                model: model_key.to_string(),
            })?;
        Ok(model.cost.evaluate(model_key, params)?.amount)
    }

    /// Price every leaf step. Parallel groups contribute the sum of all children.
    /// All formula errors are collected.
    pub fn estimate_pipeline(
        &self,
        definition: &PipelineDefinition,
    ) -> Result<CostEstimate, Vec<ValidationError>> {
        let mut tally = Tally::default();

        for step in &definition.steps {
            match step {
                Step::Single(single) => self.push_line(single, None, &mut tally),
                Step::Parallel(group) => {
                    for child in &group.children {
                        self.push_line(child, Some(&group.id), &mut tally);
                    }
                }
            }
        }

        let Tally {
            lines,
            errors,
            total,
        } = tally;
        if !errors.is_empty() {
            return Err(errors);
        }

        tracing::debug!(
            pipeline = %definition.name,
            lines = lines.len(),
            total = %total,
            "Estimated pipeline cost"
        );
        Ok(CostEstimate {
            pipeline: definition.name.clone(),
            lines,
            total,
        })
    }

    fn push_line(&self, step: &SingleStep, group: Option<&str>, tally: &mut Tally) {
        let value = match self.estimate_step(step) {
            Ok(value) => value,
            Err(err) => return tally.errors.push(err),
        };
        match tally.total.checked_add(value.amount) {
            Some(total) => tally.total = total,
            None => tally.errors.push(ValidationError::InvalidParameter {
                step_id: step.id.clone(),
                param: step.model.cost.params().last().copied().unwrap_or("cost").to_string(),
                reason: "pushes the pipeline total past the largest representable amount"
                    .to_string(),
            }),
        }
        tally.lines.push(CostLine {
            step_id: step.id.clone(),
            group: group.map(str::to_string),
            model: step.model.key.to_string(),
            provider: step.model.provider,
            cost: value.amount,
            approximate: value.approximate,
        });
    }
}

/// Running state of a pipeline estimate.
#[derive(Default)]
struct Tally {
    lines: Vec<CostLine>,
    errors: Vec<ValidationError>,
    total: Money,
}
