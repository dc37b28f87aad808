//! Output quality subsystem.
//!
//! # Data Flow
//! ```text
//! backend reply
//!     → validator.rs (length → generic phrases → diversity → structure)
//!     → ValidationVerdict { passed, reason }
//!     → orchestrator treats a rejection as a failed attempt
//! ```
//!
//! Thresholds come from the `[validation]` config section and can be
//! swapped at runtime by the config watcher.

pub mod validator;

pub use validator::{ContentValidator, Rejection, ValidationVerdict};
