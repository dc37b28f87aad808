//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routing names existing backends)
//! - Validate value ranges (attempts > 0, ratios in (0, 1])
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, ValidationConfig};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("duplicate backend name `{0}`")]
    DuplicateBackend(String),

    #[error("backend `{name}` has invalid endpoint `{endpoint}`")]
    InvalidEndpoint { name: String, endpoint: String },

    #[error("backend `{name}` has a zero {window} limit")]
    ZeroLimit { name: String, window: &'static str },

    #[error("routing for `{component_type}` names unknown backend `{backend}`")]
    UnknownRoutedBackend {
        component_type: String,
        backend: String,
    },

    #[error("`{field}` must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("timeouts.generation_secs ({generation_secs}) must be below timeouts.request_secs ({request_secs})")]
    GenerationOutlastsRequest {
        generation_secs: u64,
        request_secs: u64,
    },

    #[error("diversity ratio for `{scope}` must be in (0, 1], got {value}")]
    RatioOutOfRange { scope: String, value: f64 },
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for backend in &config.backends {
        if !seen.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        if Url::parse(&backend.endpoint).is_err() {
            errors.push(ValidationError::InvalidEndpoint {
                name: backend.name.clone(),
                endpoint: backend.endpoint.clone(),
            });
        }
        if backend.hourly_limit == Some(0) {
            errors.push(ValidationError::ZeroLimit {
                name: backend.name.clone(),
                window: "hourly",
            });
        }
        if backend.daily_limit == Some(0) {
            errors.push(ValidationError::ZeroLimit {
                name: backend.name.clone(),
                window: "daily",
            });
        }
    }

    for (component_type, names) in &config.routing.priorities {
        for name in names {
            if !seen.contains(name.as_str()) {
                errors.push(ValidationError::UnknownRoutedBackend {
                    component_type: component_type.clone(),
                    backend: name.clone(),
                });
            }
        }
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::NotPositive {
            field: "retries.max_attempts",
        });
    }
    if config.circuit_breaker.max_errors_before_disable == 0 {
        errors.push(ValidationError::NotPositive {
            field: "circuit_breaker.max_errors_before_disable",
        });
    }
    if config.timeouts.attempt_secs == 0 {
        errors.push(ValidationError::NotPositive {
            field: "timeouts.attempt_secs",
        });
    }
    if config.timeouts.generation_secs == 0 {
        errors.push(ValidationError::NotPositive {
            field: "timeouts.generation_secs",
        });
    }
    if config.timeouts.generation_secs >= config.timeouts.request_secs {
        errors.push(ValidationError::GenerationOutlastsRequest {
            generation_secs: config.timeouts.generation_secs,
            request_secs: config.timeouts.request_secs,
        });
    }

    errors.extend(validate_quality_policy(&config.validation));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks on the hot-reloadable `[validation]` section.
pub fn validate_quality_policy(policy: &ValidationConfig) -> Vec<ValidationError> {
    let in_range = |value: f64| value > 0.0 && value <= 1.0;

    let mut errors = Vec::new();
    if !in_range(policy.default_min_diversity) {
        errors.push(ValidationError::RatioOutOfRange {
            scope: "default".to_string(),
            value: policy.default_min_diversity,
        });
    }
    for (component_type, &value) in &policy.min_diversity {
        if !in_range(value) {
            errors.push(ValidationError::RatioOutOfRange {
                scope: component_type.clone(),
                value,
            });
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BackendConfig;

    fn backend(name: &str) -> BackendConfig {
        BackendConfig {
            name: name.to_string(),
            model: "m".to_string(),
            endpoint: "http://127.0.0.1:7000/complete".to_string(),
            priority: 1,
            daily_limit: None,
            hourly_limit: None,
            supports_tools: false,
            api_key_env: None,
            max_errors_before_disable: None,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_routing_must_name_known_backends() {
        let mut config = GatewayConfig::default();
        config.backends.push(backend("a"));
        config
            .routing
            .priorities
            .insert("avatar".into(), vec!["a".into(), "ghost".into()]);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnknownRoutedBackend {
                component_type: "avatar".into(),
                backend: "ghost".into(),
            }]
        );
    }

    #[test]
    fn test_zero_limits_and_ratios_rejected() {
        let mut config = GatewayConfig::default();
        let mut b = backend("a");
        b.hourly_limit = Some(0);
        config.backends.push(b);
        config.validation.default_min_diversity = 1.5;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_generation_budget_must_fit_inside_request_timeout() {
        let mut config = GatewayConfig::default();
        config.timeouts.request_secs = 120;
        config.timeouts.generation_secs = 120;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::GenerationOutlastsRequest {
                generation_secs: 120,
                request_secs: 120,
            }]
        );

        config.timeouts.generation_secs = 90;
        assert!(validate_config(&config).is_ok());
    }
}
