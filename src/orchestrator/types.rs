//! Request, result and per-attempt outcome types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resilience::FailureKind;

/// `backend_used` value when no backend produced the text.
pub const EMERGENCY_BACKEND: &str = "emergency";

fn default_max_tokens() -> u32 {
    4000
}

fn default_temperature() -> f32 {
    0.7
}

/// One generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub component_type: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Fields for the emergency template (`product`, `niche`, `audience`, ...).
    #[serde(default)]
    pub context: HashMap<String, String>,
    /// Only route to backends that accept tool definitions.
    #[serde(default)]
    pub require_tools: bool,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            component_type: component_type.into(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            context: HashMap::new(),
            require_tools: false,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn requiring_tools(mut self) -> Self {
        self.require_tools = true;
        self
    }
}

/// What `generate` hands back. Always carries non-empty text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    /// Backend name, or [`EMERGENCY_BACKEND`].
    pub backend_used: String,
    /// Model of the backend used; `None` in emergency mode.
    pub model: Option<String>,
    /// Backend calls made, across all candidates.
    pub attempts: u32,
    pub elapsed_ms: u64,
    pub emergency_mode: bool,
    pub request_id: Uuid,
}

/// Result of a single backend attempt after validation.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(String),
    Failure { kind: FailureKind, message: String },
}

impl AttemptOutcome {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        AttemptOutcome::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_from_json() {
        let request: GenerationRequest =
            serde_json::from_str(r#"{"prompt": "Describe", "component_type": "avatar"}"#).unwrap();
        assert_eq!(request.max_tokens, 4000);
        assert!((request.temperature - 0.7).abs() < f32::EPSILON);
        assert!(request.context.is_empty());
        assert!(!request.require_tools);
    }

    #[test]
    fn test_builder() {
        let request = GenerationRequest::new("p", "analysis")
            .with_max_tokens(256)
            .with_context("product", "FocusApp")
            .requiring_tools();
        assert_eq!(request.max_tokens, 256);
        assert_eq!(request.context["product"], "FocusApp");
        assert!(request.require_tools);
    }
}
