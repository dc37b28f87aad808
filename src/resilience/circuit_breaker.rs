//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: `available`, requests pass through
//! - Open: `available == false` until `disabled_until`
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= max_errors_before_disable
//!                (cooldown = failure_cooldown)
//! Closed → Open: quota_exceeded classified (cooldown = quota_cooldown)
//! Open → Closed: disabled_until <= now, checked before every candidate build
//! Open → Closed: a success lands while a failure cooldown is running
//! ```
//!
//! # Design Decisions
//! - Per-backend state, not global
//! - Quality rejections count at a reduced weight and never open the
//!   circuit on their own
//! - No half-open probe: a reactivated backend gets a clean failure count

use std::sync::Arc;
use std::time::Duration;

use crate::backends::{BackendEntry, DisableReason};
use crate::clock::Clock;
use crate::config::CircuitBreakerConfig;
use crate::resilience::retries::FailureKind;

/// Tunables for the breaker, resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerPolicy {
    pub max_errors_before_disable: u32,
    pub failure_cooldown: Duration,
    pub quota_cooldown: Duration,
    /// Number of validation rejections that add up to one failure.
    pub validation_penalty_interval: u32,
}

impl From<&CircuitBreakerConfig> for BreakerPolicy {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            max_errors_before_disable: config.max_errors_before_disable.max(1),
            failure_cooldown: Duration::from_secs(config.failure_cooldown_secs),
            quota_cooldown: Duration::from_secs(config.quota_cooldown_secs),
            validation_penalty_interval: config.validation_penalty_interval.max(1),
        }
    }
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self::from(&CircuitBreakerConfig::default())
    }
}

/// Records attempt outcomes and opens/closes backend circuits.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    policy: BreakerPolicy,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(policy: BreakerPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    pub fn policy(&self) -> &BreakerPolicy {
        &self.policy
    }

    /// Reset the failure streak and close a failure cooldown.
    pub fn record_success(&self, entry: &BackendEntry) {
        let now = self.clock.now();
        let mut state = entry.lock_state();
        state.consecutive_failures = 0;
        state.pending_validation_strikes = 0;
        state.last_success_at = Some(now);

        if state.disabled_reason == Some(DisableReason::Failures) {
            state.available = true;
            state.disabled_until = None;
            state.disabled_reason = None;
            tracing::info!(backend = %entry.name(), "Backend recovered, circuit closed");
        }
    }

    /// Record a failed attempt. Returns true if this call opened the circuit.
    pub fn record_failure(&self, entry: &BackendEntry, kind: FailureKind) -> bool {
        let now = self.clock.now();
        let mut state = entry.lock_state();
        state.error_count += 1;

        match kind {
            FailureKind::QuotaExceeded => {
                let until = now + self.policy.quota_cooldown;
                state.available = false;
                state.disabled_until = Some(until);
                state.disabled_reason = Some(DisableReason::QuotaExceeded);
                tracing::warn!(
                    backend = %entry.name(),
                    cooldown_secs = self.policy.quota_cooldown.as_secs(),
                    "Backend quota exhausted, disabled"
                );
                true
            }
            FailureKind::ValidationRejected => {
                state.pending_validation_strikes += 1;
                if state.pending_validation_strikes >= self.policy.validation_penalty_interval {
                    state.pending_validation_strikes = 0;
                    // Never reach the threshold on quality alone.
                    let ceiling = state.max_errors_before_disable.saturating_sub(1);
                    if state.consecutive_failures < ceiling {
                        state.consecutive_failures += 1;
                    }
                }
                false
            }
            FailureKind::TransientNetwork
            | FailureKind::RateLimited
            | FailureKind::InvalidResponse
            | FailureKind::Fatal => {
                state.consecutive_failures += 1;
                if state.available && state.consecutive_failures >= state.max_errors_before_disable {
                    let until = now + self.policy.failure_cooldown;
                    state.available = false;
                    state.disabled_until = Some(until);
                    state.disabled_reason = Some(DisableReason::Failures);
                    tracing::warn!(
                        backend = %entry.name(),
                        consecutive_failures = state.consecutive_failures,
                        cooldown_secs = self.policy.failure_cooldown.as_secs(),
                        "Backend disabled after consecutive failures"
                    );
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Close the circuit if its cooldown has elapsed. Returns true on reactivation.
    pub fn maybe_reactivate(&self, entry: &BackendEntry) -> bool {
        let now = self.clock.now();
        let mut state = entry.lock_state();
        let expired = state.disabled_until.is_some_and(|until| until <= now);
        if !expired {
            return false;
        }

        state.available = true;
        state.consecutive_failures = 0;
        state.pending_validation_strikes = 0;
        state.disabled_until = None;
        state.disabled_reason = None;
        tracing::info!(backend = %entry.name(), "Cooldown elapsed, backend reactivated");
        true
    }
}
