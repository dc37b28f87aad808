//! Generation orchestration.
//!
//! # Data Flow
//! ```text
//! GenerationRequest
//!     → engine.rs (candidate order, attempts, retries)
//!         → backends (CompletionBackend::complete under a deadline)
//!         → quality (validate reply)
//!         → resilience (quota + breaker bookkeeping)
//!     → GenerationResult (backend text, or emergency template)
//! ```

pub mod engine;
pub mod types;

pub use engine::Orchestrator;
pub use types::{AttemptOutcome, GenerationRequest, GenerationResult, EMERGENCY_BACKEND};
