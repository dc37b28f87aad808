//! Backend subsystem.
//!
//! # Data Flow
//! ```text
//! config [[backends]]
//!     → descriptor.rs (immutable identity, limits, capabilities)
//!     → http.rs / mock.rs (CompletionBackend adapters)
//!     → registry.rs (one entry per backend, created at startup)
//!         → state.rs (mutable health + quota state behind a per-backend mutex)
//! ```
//!
//! # Design Decisions
//! - Every backend is reached through the single `CompletionBackend` trait
//! - Adapters classify their own failures into `BackendErrorKind`
//! - Entries live for the whole process; only resilience code mutates state

pub mod descriptor;
pub mod http;
pub mod mock;
pub mod registry;
pub mod state;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use descriptor::BackendDescriptor;
pub use registry::{BackendEntry, BackendRegistry, BackendStatus, RegistryError, StatusReport};
pub use state::{BackendRuntimeState, DisableReason, QuotaWindow};

/// How a backend call failed, as reported by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    /// Too many requests right now; worth retrying after a pause.
    RateLimited,
    /// The account's request budget is spent.
    QuotaExceeded,
    /// Network trouble, timeouts, 5xx.
    Transient,
    /// Anything that will not get better by retrying.
    Fatal,
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BackendErrorKind::RateLimited => "rate_limited",
            BackendErrorKind::QuotaExceeded => "quota_exceeded",
            BackendErrorKind::Transient => "transient",
            BackendErrorKind::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

/// Error returned by a [`CompletionBackend`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::RateLimited, message)
    }

    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::QuotaExceeded, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Transient, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Fatal, message)
    }
}

/// The one capability every text-generation backend exposes.
#[async_trait]
pub trait CompletionBackend: fmt::Debug + Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError>;
}
