//! Retry state machine for provider calls.
//!
//! The caller feeds each failed attempt into [`RetryState::record_failure`] and
//! acts on the returned [`RetryDecision`]. Sleeping goes through a [`Clock`] so
//! backoff can be observed in tests without real delays.

use crate::provider::TransportError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-based): base doubled per attempt, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// How a failed attempt is treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureClass {
    /// HTTP 429.
    RateLimited { retry_after: Option<Duration> },
    /// HTTP 401/403: the key itself is bad.
    CredentialRejected,
    /// 500/502/503/504, timeouts and connection failures.
    Transient,
    Permanent,
}

impl FailureClass {
    pub fn classify(error: &TransportError) -> Self {
        match error {
            TransportError::Status {
                status: 429,
                retry_after,
                ..
            } => FailureClass::RateLimited {
                retry_after: *retry_after,
            },
            TransportError::Status {
                status: 401 | 403, ..
            } => FailureClass::CredentialRejected,
            TransportError::Status {
                status: 500 | 502 | 503 | 504,
                ..
            } => FailureClass::Transient,
            TransportError::Status { .. } => FailureClass::Permanent,
            TransportError::Timeout | TransportError::Connect(_) => FailureClass::Transient,
            TransportError::Malformed(_) | TransportError::Other(_) => FailureClass::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureClass::Permanent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry {
        delay: Duration,
        /// Move to another key before the next attempt if one exists.
        rotate_key: bool,
        /// Blacklist the key used for the failed attempt, then rotate.
        blacklist_key: bool,
    },
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempts: u32,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Failed attempts recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn record_failure(&mut self, class: &FailureClass) -> RetryDecision {
        self.attempts += 1;
        if !class.is_retryable() || self.attempts >= self.policy.max_attempts {
            return RetryDecision::GiveUp;
        }
        let backoff = self.policy.backoff(self.attempts);
        match class {
            FailureClass::RateLimited { retry_after } => RetryDecision::Retry {
                delay: retry_after
                    .map(|d| d.min(self.policy.max_delay))
                    .unwrap_or(backoff),
                rotate_key: true,
                blacklist_key: false,
            },
            FailureClass::CredentialRejected => RetryDecision::Retry {
                delay: Duration::ZERO,
                rotate_key: true,
                blacklist_key: true,
            },
            FailureClass::Transient => RetryDecision::Retry {
                delay: backoff,
                rotate_key: false,
                blacklist_key: false,
            },
            FailureClass::Permanent => RetryDecision::GiveUp,
        }
    }
}

/// Source of backoff sleeps.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately and records every requested sleep.
#[derive(Debug, Default)]
pub struct InstantClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl InstantClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

#[async_trait]
impl Clock for InstantClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        tokio::task::yield_now().await;
    }
}
