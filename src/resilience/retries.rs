//! Failure classification and retry policy.
//!
//! # Responsibilities
//! - Name every way a generation attempt can fail
//! - Decide whether an attempt may be repeated on the same backend
//! - Produce the delay before the next attempt
//!
//! # Design Decisions
//! - Only rate limiting and transient network trouble are worth repeating
//! - Quota, fatal and quality failures escalate to the next backend at once
//! - Attempts per backend are bounded; the bound counts the first attempt

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backends::BackendErrorKind;
use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Outcome classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    TransientNetwork,
    RateLimited,
    QuotaExceeded,
    /// Empty or unusable output.
    InvalidResponse,
    /// Output failed the content quality gate.
    ValidationRejected,
    Fatal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::TransientNetwork => "transient_network",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::QuotaExceeded => "quota_exceeded",
            FailureKind::InvalidResponse => "invalid_response",
            FailureKind::ValidationRejected => "validation_rejected",
            FailureKind::Fatal => "fatal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<BackendErrorKind> for FailureKind {
    fn from(kind: BackendErrorKind) -> Self {
        match kind {
            BackendErrorKind::RateLimited => FailureKind::RateLimited,
            BackendErrorKind::QuotaExceeded => FailureKind::QuotaExceeded,
            BackendErrorKind::Transient => FailureKind::TransientNetwork,
            BackendErrorKind::Fatal => FailureKind::Fatal,
        }
    }
}

/// Bounded same-backend retry with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts allowed on one backend, first attempt included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Also repeat transient network failures, not just rate limits.
    pub retry_transient: bool,
}

impl RetryPolicy {
    /// Whether a backend that just failed its `attempt`-th try (1-based)
    /// with `kind` should be tried again.
    pub fn should_retry(&self, kind: FailureKind, attempt: u32) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        match kind {
            FailureKind::RateLimited => true,
            FailureKind::TransientNetwork => self.retry_transient,
            _ => false,
        }
    }

    /// Delay to wait after the `attempt`-th failed try.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay, self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            retry_transient: config.retry_transient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rate_limits_and_transient_retry() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(FailureKind::RateLimited, 1));
        assert!(policy.should_retry(FailureKind::TransientNetwork, 1));
        assert!(!policy.should_retry(FailureKind::QuotaExceeded, 1));
        assert!(!policy.should_retry(FailureKind::ValidationRejected, 1));
        assert!(!policy.should_retry(FailureKind::InvalidResponse, 1));
        assert!(!policy.should_retry(FailureKind::Fatal, 1));
    }

    #[test]
    fn test_attempts_are_bounded() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        assert!(policy.should_retry(FailureKind::RateLimited, 2));
        assert!(!policy.should_retry(FailureKind::RateLimited, 3));
    }

    #[test]
    fn test_transient_retry_can_be_disabled() {
        let policy = RetryPolicy {
            retry_transient: false,
            ..RetryPolicy::default()
        };
        assert!(!policy.should_retry(FailureKind::TransientNetwork, 1));
        assert!(policy.should_retry(FailureKind::RateLimited, 1));
    }

    #[test]
    fn test_backend_kinds_map_onto_failures() {
        assert_eq!(
            FailureKind::from(BackendErrorKind::Transient),
            FailureKind::TransientNetwork
        );
        assert_eq!(
            FailureKind::from(BackendErrorKind::QuotaExceeded),
            FailureKind::QuotaExceeded
        );
    }
}
