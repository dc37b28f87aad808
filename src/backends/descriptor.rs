//! Static identity of a backend.

use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;

/// Immutable description of a backend: who it is, how preferred it is and
/// how much it may be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Unique backend name.
    pub name: String,
    /// Model identifier passed to the backend.
    pub model: String,
    /// Default priority rank (lower = preferred).
    pub priority: u32,
    /// Requests allowed per rolling day (`None` = unlimited).
    pub daily_limit: Option<u32>,
    /// Requests allowed per rolling hour (`None` = unlimited).
    pub hourly_limit: Option<u32>,
    /// Whether the backend accepts structured tool definitions.
    pub supports_tools: bool,
}

impl BackendDescriptor {
    pub fn new(name: impl Into<String>, model: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            priority,
            daily_limit: None,
            hourly_limit: None,
            supports_tools: false,
        }
    }

    pub fn with_daily_limit(mut self, limit: u32) -> Self {
        self.daily_limit = Some(limit);
        self
    }

    pub fn with_hourly_limit(mut self, limit: u32) -> Self {
        self.hourly_limit = Some(limit);
        self
    }

    pub fn with_tools(mut self) -> Self {
        self.supports_tools = true;
        self
    }
}

impl From<&BackendConfig> for BackendDescriptor {
    fn from(config: &BackendConfig) -> Self {
        Self {
            name: config.name.clone(),
            model: config.model.clone(),
            priority: config.priority,
            daily_limit: config.daily_limit,
            hourly_limit: config.hourly_limit,
            supports_tools: config.supports_tools,
        }
    }
}
