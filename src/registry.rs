//! Model Registry
//!
//! Immutable catalog of generation models. Built once and shared behind an
//! `Arc`; lookups are plain map reads. A missing key is a normal outcome.

pub mod catalog;
pub mod category;
pub mod schema;

pub use category::{ArtifactKind, ModelCategory};
pub use schema::{ParamKind, ParamSpec};

use crate::cost::{CostFormula, Money};
use crate::provider::ProviderId;
use serde::Serialize;
use serde_json::Map;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    pub key: &'static str,
    pub name: &'static str,
    pub category: ModelCategory,
    pub provider: ProviderId,
    /// Path appended to the provider base URL.
    pub endpoint: &'static str,
    /// Upstream model name for providers that route by body field.
    pub remote_model: Option<&'static str>,
    pub params: Vec<ParamSpec>,
    pub cost: CostFormula,
}

impl ModelDescriptor {
    /// Descriptor with the default parameter schema of its category.
    pub fn new(
        key: &'static str,
        name: &'static str,
        category: ModelCategory,
        provider: ProviderId,
        endpoint: &'static str,
        cost: CostFormula,
    ) -> Self {
        Self {
            key,
            name,
            category,
            provider,
            endpoint,
            remote_model: None,
            params: catalog::default_params(category),
            cost,
        }
    }

    /// Replace a parameter of the same name, or add it.
    pub fn with_param(mut self, spec: ParamSpec) -> Self {
        match self.params.iter_mut().find(|p| p.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.params.push(spec),
        }
        self
    }

    pub fn with_params(mut self, params: Vec<ParamSpec>) -> Self {
        self.params = params;
        self
    }

    pub fn with_remote_model(mut self, remote_model: &'static str) -> Self {
        self.remote_model = Some(remote_model);
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn required_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.required)
    }

    pub fn output_kind(&self) -> ArtifactKind {
        self.category.output_kind()
    }

    /// Price with every parameter at its default. `None` when the formula
    /// needs an input that has no default.
    pub fn base_cost(&self) -> Option<Money> {
        self.cost
            .evaluate(self.key, &Map::new())
            .ok()
            .map(|value| value.amount)
    }
}

/// Listing row for catalog output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub key: String,
    pub name: String,
    pub category: ModelCategory,
    pub provider: ProviderId,
    /// `None` when the price depends on a parameter without a default.
    pub base_cost: Option<Money>,
}

impl From<&ModelDescriptor> for CatalogEntry {
    fn from(model: &ModelDescriptor) -> Self {
        Self {
            key: model.key.to_string(),
            name: model.name.to_string(),
            category: model.category,
            provider: model.provider,
            base_cost: model.base_cost(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<&'static str, Arc<ModelDescriptor>>,
}

impl ModelRegistry {
    /// The built-in catalog.
    pub fn builtin() -> Self {
        Self::from_models(catalog::builtin_models())
    }

    /// Registry over an explicit model list. A later duplicate key replaces an earlier one.
    pub fn from_models(models: impl IntoIterator<Item = ModelDescriptor>) -> Self {
        let models = models
            .into_iter()
            .map(|model| (model.key, Arc::new(model)))
            .collect();
        Self { models }
    }

    pub fn lookup(&self, key: &str) -> Option<Arc<ModelDescriptor>> {
        self.models.get(key).cloned()
    }

    /// Models of one category, ordered by key.
    pub fn list_by_category(&self, category: ModelCategory) -> Vec<Arc<ModelDescriptor>> {
        self.models
            .values()
            .filter(|model| model.category == category)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<CatalogEntry> {
        self.models.values().map(|m| CatalogEntry::from(m.as_ref())).collect()
    }

    /// Model count per category, in category order. Empty categories are included.
    pub fn categories(&self) -> Vec<(ModelCategory, usize)> {
        ModelCategory::ALL
            .iter()
            .map(|category| {
                let count = self
                    .models
                    .values()
                    .filter(|m| m.category == *category)
                    .count();
                (*category, count)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
