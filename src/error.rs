//! Error types for the pipeline engine.
//!
//! The taxonomy follows the lifecycle of a run: validation problems are found
//! before any network call, credential and provider errors come out of the
//! provider caller, and [`StepError`] is the serializable classification that
//! lands in run reports and progress events.

use crate::cost::Money;
use crate::provider::ProviderId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Problems found in a pipeline document or its cost parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("Document could not be parsed: {message}")]
    Document { message: String },

    #[error("Pipeline has no steps")]
    EmptyPipeline,

    #[error("Step '{step_id}': invalid step id (use letters, digits, '_' or '-', starting with a letter or '_')")]
    InvalidStepId { step_id: String },

    #[error("Step '{step_id}': name '{name}' is already used by another step or output")]
    DuplicateName { step_id: String, name: String },

    #[error("Step '{step_id}': unknown step type '{value}'")]
    UnknownCategory { step_id: String, value: String },

    #[error("Step '{step_id}': no model given")]
    MissingModel { step_id: String },

    #[error("Step '{step_id}': model '{model}' not found in registry")]
    UnknownModel { step_id: String, model: String },

    #[error("Step '{step_id}': declared type {declared} does not match model '{model}' ({actual})")]
    CategoryMismatch {
        step_id: String,
        model: String,
        declared: String,
        actual: String,
    },

    #[error("Step '{step_id}': missing required parameter '{param}'")]
    MissingParameter { step_id: String, param: String },

    #[error("Step '{step_id}': parameter '{param}' {reason}")]
    InvalidParameter {
        step_id: String,
        param: String,
        reason: String,
    },

    #[error("Step '{step_id}': parameter '{param}' references unknown step '{target}'")]
    DanglingReference {
        step_id: String,
        param: String,
        target: String,
    },

    #[error("Step '{step_id}': parameter '{param}' references '{target}', which does not run before it")]
    ForwardReference {
        step_id: String,
        param: String,
        target: String,
    },

    #[error("Step '{step_id}': parameter '{param}' references sibling '{target}' of the same parallel group")]
    SiblingReference {
        step_id: String,
        param: String,
        target: String,
    },

    #[error("Step '{step_id}': parameter '{param}' expects {expected} but '{target}' produces {actual}")]
    ReferenceKindMismatch {
        step_id: String,
        param: String,
        target: String,
        expected: String,
        actual: String,
    },

    #[error("Parallel group '{step_id}' has no child steps")]
    EmptyGroup { step_id: String },

    #[error("Parallel group '{step_id}': nested parallel groups are not supported")]
    NestedGroup { step_id: String },

    #[error("Parallel group '{step_id}': unknown merge strategy '{value}'")]
    UnknownMergeStrategy { step_id: String, value: String },

    #[error("Pipeline config: {message}")]
    InvalidConfig { message: String },
}

impl ValidationError {
    /// The step the error is about, when it is about one.
    pub fn step_id(&self) -> Option<&str> {
        match self {
            ValidationError::Document { .. }
            | ValidationError::EmptyPipeline
            | ValidationError::InvalidConfig { .. } => None,
            ValidationError::InvalidStepId { step_id }
            | ValidationError::DuplicateName { step_id, .. }
            | ValidationError::UnknownCategory { step_id, .. }
            | ValidationError::MissingModel { step_id }
            | ValidationError::UnknownModel { step_id, .. }
            | ValidationError::CategoryMismatch { step_id, .. }
            | ValidationError::MissingParameter { step_id, .. }
            | ValidationError::InvalidParameter { step_id, .. }
            | ValidationError::DanglingReference { step_id, .. }
            | ValidationError::ForwardReference { step_id, .. }
            | ValidationError::SiblingReference { step_id, .. }
            | ValidationError::ReferenceKindMismatch { step_id, .. }
            | ValidationError::EmptyGroup { step_id }
            | ValidationError::NestedGroup { step_id }
            | ValidationError::UnknownMergeStrategy { step_id, .. } => Some(step_id),
        }
    }
}

/// Credential pool failures. Terminal for the provider; never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialError {
    #[error("no credentials configured for provider {provider} (set {env_var})")]
    NotConfigured { provider: ProviderId, env_var: String },

    #[error("all credentials for provider {provider} are blacklisted")]
    Exhausted { provider: ProviderId },
}

impl CredentialError {
    pub fn provider(&self) -> ProviderId {
        match self {
            CredentialError::NotConfigured { provider, .. }
            | CredentialError::Exhausted { provider } => *provider,
        }
    }
}

/// Outcome of a provider call that did not produce an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("{provider} failed after {attempts} attempt(s) ({}): {message}", describe_status(.status))]
    Transient {
        provider: ProviderId,
        status: Option<u16>,
        attempts: u32,
        message: String,
    },

    #[error("{provider} rejected the request ({}): {message}", describe_status(.status))]
    Permanent {
        provider: ProviderId,
        status: Option<u16>,
        message: String,
    },

    #[error("{provider} call cancelled")]
    Cancelled { provider: ProviderId },
}

impl ProviderError {
    pub fn provider(&self) -> ProviderId {
        match self {
            ProviderError::Credential(err) => err.provider(),
            ProviderError::Transient { provider, .. }
            | ProviderError::Permanent { provider, .. }
            | ProviderError::Cancelled { provider } => *provider,
        }
    }

    /// HTTP status of the last failed attempt, if the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Transient { status, .. } | ProviderError::Permanent { status, .. } => {
                *status
            }
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProviderError::Cancelled { .. })
    }
}

fn describe_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {}", code),
        None => "no response".to_string(),
    }
}

/// Why a step did not produce a result. Serialized into reports and events.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "classification", rename_all = "snake_case")]
pub enum StepError {
    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("credential error: {message}")]
    Credential { provider: ProviderId, message: String },

    #[error("transient provider error after {attempts} attempt(s): {message}")]
    TransientProvider {
        provider: ProviderId,
        status: Option<u16>,
        attempts: u32,
        message: String,
    },

    #[error("permanent provider error: {message}")]
    PermanentProvider {
        provider: ProviderId,
        status: Option<u16>,
        message: String,
    },

    #[error("dependency '{upstream}' did not produce a result")]
    DependencyFailed { upstream: String },

    #[error("parallel group failed: {message}")]
    GroupFailed {
        message: String,
        failed_children: Vec<String>,
    },

    #[error("skipped: {reason}")]
    Skipped { reason: String },

    #[error("cancelled")]
    Cancelled,
}

impl StepError {
    /// Short machine-readable classification, matching the serialized tag.
    pub fn classification(&self) -> &'static str {
        match self {
            StepError::Validation { .. } => "validation",
            StepError::Credential { .. } => "credential",
            StepError::TransientProvider { .. } => "transient_provider",
            StepError::PermanentProvider { .. } => "permanent_provider",
            StepError::DependencyFailed { .. } => "dependency_failed",
            StepError::GroupFailed { .. } => "group_failed",
            StepError::Skipped { .. } => "skipped",
            StepError::Cancelled => "cancelled",
        }
    }
}

impl From<ProviderError> for StepError {
    fn from(err: ProviderError) -> Self {
        let message = err.to_string();
        match err {
            ProviderError::Credential(inner) => StepError::Credential {
                provider: inner.provider(),
                message,
            },
            ProviderError::Transient {
                provider,
                status,
                attempts,
                ..
            } => StepError::TransientProvider {
                provider,
                status,
                attempts,
                message,
            },
            ProviderError::Permanent {
                provider, status, ..
            } => StepError::PermanentProvider {
                provider,
                status,
                message,
            },
            ProviderError::Cancelled { .. } => StepError::Cancelled,
        }
    }
}

impl From<ValidationError> for StepError {
    fn from(err: ValidationError) -> Self {
        StepError::Validation {
            message: err.to_string(),
        }
    }
}

/// Top-level engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Pipeline validation failed with {} error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    #[error("Estimated cost {estimated} exceeds budget {limit}")]
    BudgetExceeded { estimated: Money, limit: Money },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Run task failed: {0}")]
    RunAborted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl From<Vec<ValidationError>> for EngineError {
    fn from(errors: Vec<ValidationError>) -> Self {
        EngineError::Validation(errors)
    }
}
