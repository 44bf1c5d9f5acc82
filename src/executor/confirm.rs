//! Confirmation gate consulted between estimation and execution.

use crate::cost::CostEstimate;
use async_trait::async_trait;

#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    /// `true` to spend the estimated amount.
    async fn confirm(&self, estimate: &CostEstimate) -> bool;
}

/// For non-interactive callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

#[async_trait]
impl ConfirmationGate for AutoApprove {
    async fn confirm(&self, _estimate: &CostEstimate) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AutoDecline;

#[async_trait]
impl ConfirmationGate for AutoDecline {
    async fn confirm(&self, _estimate: &CostEstimate) -> bool {
        false
    }
}
