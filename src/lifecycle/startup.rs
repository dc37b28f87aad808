//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn a validated `GatewayConfig` into a registry of HTTP backends
//! - Apply per-component-type routing
//! - Build the orchestrator with the configured retry and timeout policy
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - A missing API key variable is logged, not fatal (local sidecars
//!   often need none)

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::backends::http::HttpCompletionBackend;
use crate::backends::{BackendDescriptor, BackendError, BackendRegistry, RegistryError};
use crate::clock::Clock;
use crate::config::GatewayConfig;
use crate::orchestrator::Orchestrator;
use crate::quality::ContentValidator;
use crate::resilience::{BreakerPolicy, RetryPolicy};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("backend `{name}`: invalid endpoint: {source}")]
    Endpoint {
        name: String,
        source: url::ParseError,
    },

    #[error("backend `{name}`: {source}")]
    Backend { name: String, source: BackendError },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Registry populated from `config.backends`, with routing applied.
pub fn build_registry(
    config: &GatewayConfig,
    clock: Arc<dyn Clock>,
) -> Result<BackendRegistry, StartupError> {
    let mut registry = BackendRegistry::new(BreakerPolicy::from(&config.circuit_breaker), clock);
    let connect_timeout = Duration::from_secs(config.timeouts.connect_secs);

    for backend in &config.backends {
        let endpoint = Url::parse(&backend.endpoint).map_err(|source| StartupError::Endpoint {
            name: backend.name.clone(),
            source,
        })?;

        let api_key = backend.api_key_env.as_deref().and_then(|var| match std::env::var(var) {
            Ok(key) if !key.is_empty() => Some(key),
            _ => {
                tracing::warn!(backend = %backend.name, env = var, "API key variable not set");
                None
            }
        });

        let client = HttpCompletionBackend::new(endpoint, &backend.model, api_key, connect_timeout)
            .map_err(|source| StartupError::Backend {
                name: backend.name.clone(),
                source,
            })?;

        let threshold = backend
            .max_errors_before_disable
            .unwrap_or(config.circuit_breaker.max_errors_before_disable);
        registry.register_with_threshold(BackendDescriptor::from(backend), Arc::new(client), threshold)?;
    }

    for (component_type, names) in &config.routing.priorities {
        registry.set_priorities(component_type.clone(), names.clone())?;
    }

    Ok(registry)
}

/// Orchestrator and its validator, ready to serve.
pub fn build_orchestrator(
    config: &GatewayConfig,
    clock: Arc<dyn Clock>,
) -> Result<Orchestrator, StartupError> {
    let registry = build_registry(config, clock)?;
    tracing::info!(backends = registry.len(), "Registry ready");

    let validator = Arc::new(ContentValidator::new(config.validation.clone()));
    Ok(Orchestrator::new(Arc::new(registry), validator)
        .with_retry_policy(RetryPolicy::from(&config.retries))
        .with_attempt_timeout(Duration::from_secs(config.timeouts.attempt_secs))
        .with_generation_budget(Duration::from_secs(config.timeouts.generation_secs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::parse_config;

    const CONFIG: &str = r#"
[[backends]]
name = "primary"
model = "large"
endpoint = "http://127.0.0.1:7001/complete"
priority = 1
hourly_limit = 10
max_errors_before_disable = 5

[[backends]]
name = "secondary"
model = "small"
endpoint = "http://127.0.0.1:7002/complete"
priority = 2
supports_tools = true

[routing.priorities]
avatar = ["secondary", "primary"]
"#;

    #[test]
    fn test_build_registry_from_config() {
        let config = parse_config(CONFIG).unwrap();
        let registry = build_registry(&config, Arc::new(SystemClock)).unwrap();

        assert_eq!(registry.len(), 2);
        let primary = registry.get("primary").unwrap();
        assert_eq!(primary.snapshot().max_errors_before_disable, 5);
        assert_eq!(registry.get("secondary").unwrap().snapshot().max_errors_before_disable, 3);
        assert!(registry.get("secondary").unwrap().descriptor().supports_tools);

        let avatar: Vec<_> = registry
            .candidates("avatar")
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(avatar, vec!["secondary", "primary"]);
    }

    #[test]
    fn test_build_orchestrator() {
        let config = parse_config(CONFIG).unwrap();
        let orchestrator = build_orchestrator(&config, Arc::new(SystemClock)).unwrap();
        assert_eq!(orchestrator.get_status().total_backends, 2);
        assert_eq!(orchestrator.validator().policy().default_min_length, 100);
    }
}
