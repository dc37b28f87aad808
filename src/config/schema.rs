//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the generation gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend definitions.
    pub backends: Vec<BackendConfig>,

    /// Per-component-type backend preference.
    pub routing: RoutingConfig,

    /// Failure thresholds and cooldowns.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Same-backend retry configuration.
    pub retries: RetryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Output quality thresholds.
    pub validation: ValidationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier.
    pub name: String,

    /// Model identifier sent to the backend.
    pub model: String,

    /// Completion endpoint URL.
    pub endpoint: String,

    /// Default priority rank (lower = preferred).
    #[serde(default = "default_priority")]
    pub priority: u32,

    /// Requests per rolling day.
    #[serde(default)]
    pub daily_limit: Option<u32>,

    /// Requests per rolling hour.
    #[serde(default)]
    pub hourly_limit: Option<u32>,

    /// Backend accepts structured tool definitions.
    #[serde(default)]
    pub supports_tools: bool,

    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Overrides `circuit_breaker.max_errors_before_disable` for this backend.
    #[serde(default)]
    pub max_errors_before_disable: Option<u32>,
}

fn default_priority() -> u32 {
    100
}

/// Component-type routing.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RoutingConfig {
    /// component_type → backend names, most preferred first.
    pub priorities: HashMap<String, Vec<String>>,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before a backend is disabled.
    pub max_errors_before_disable: u32,

    /// Cooldown after too many consecutive failures, in seconds.
    pub failure_cooldown_secs: u64,

    /// Cooldown after a backend reports its quota spent, in seconds.
    pub quota_cooldown_secs: u64,

    /// Validation rejections that count as one consecutive failure.
    pub validation_penalty_interval: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_errors_before_disable: 3,
            failure_cooldown_secs: 10 * 60,
            quota_cooldown_secs: 60 * 60,
            validation_penalty_interval: 2,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts on one backend, first attempt included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Also retry transient network failures (rate limits always retry).
    pub retry_transient: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 30_000,
            retry_transient: true,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout for HTTP backends, in seconds.
    pub connect_secs: u64,

    /// Deadline for a single backend attempt, in seconds.
    pub attempt_secs: u64,

    /// Budget for one generation across every backend and retry, in
    /// seconds. Must stay below `request_secs` so the emergency fallback
    /// still reaches the caller.
    pub generation_secs: u64,

    /// Deadline for a whole inbound HTTP request, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            attempt_secs: 60,
            generation_secs: 300,
            request_secs: 600,
        }
    }
}

/// Content quality thresholds. Reloadable at runtime.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Minimum characters when the component type has no entry.
    pub default_min_length: usize,

    /// Minimum characters per component type.
    pub min_length: HashMap<String, usize>,

    /// Low-information boilerplate phrases (matched case-insensitively).
    pub generic_phrases: Vec<String>,

    /// Most generic-phrase occurrences tolerated.
    pub max_generic_phrases: usize,

    /// Minimum unique/total word ratio when the type has no entry.
    pub default_min_diversity: f64,

    /// Minimum unique/total word ratio per component type.
    pub min_diversity: HashMap<String, f64>,

    /// Texts longer than this many characters must show some structure.
    pub structure_threshold: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let min_length = [
            ("analysis", 500),
            ("avatar", 300),
            ("mental_drivers", 300),
            ("anti_objection", 300),
            ("competition", 300),
            ("sales_funnel", 300),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let generic_phrases = [
            "it is important to note",
            "in today's fast-paced world",
            "in conclusion",
            "as an ai language model",
            "it goes without saying",
            "at the end of the day",
            "needless to say",
            "plays a crucial role",
            "a wide range of",
            "lorem ipsum",
            "further analysis is needed",
            "to be determined",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            default_min_length: 100,
            min_length,
            generic_phrases,
            max_generic_phrases: 5,
            default_min_diversity: 0.25,
            min_diversity: HashMap::from([("analysis".to_string(), 0.3)]),
            structure_threshold: 500,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
