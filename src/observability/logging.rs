//! Structured logging.
//!
//! `RUST_LOG` wins over the configured level when set. JSON lines for
//! production, human-readable output otherwise.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global subscriber. Fails if one is already set.
pub fn init(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    }
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "textgen_gateway={level},textgen_cli={level},tower_http=info"
    ))
}
