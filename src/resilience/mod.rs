//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Generation attempt on a backend:
//!     → quota.rs (consume one unit of the backend's window budget)
//!     → timeouts.rs (enforce the per-attempt deadline)
//!     → On failure: retries.rs (classify, decide same-backend retry)
//!         → backoff.rs (exponential delay with jitter)
//!     → circuit_breaker.rs (record outcome, open/close the circuit)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - Only rate limits and transient errors are retried on the same backend
//! - The circuit breaker and quota tracker are the only writers of backend state

pub mod backoff;
pub mod circuit_breaker;
pub mod quota;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerPolicy, CircuitBreaker};
pub use quota::{QuotaError, QuotaTracker};
pub use retries::{FailureKind, RetryPolicy};
