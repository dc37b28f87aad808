//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → lifecycle::startup builds the registry and orchestrator from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → [validation] section swapped into the content validator
//! ```
//!
//! # Design Decisions
//! - Backends and routing are fixed at startup; only quality policy reloads
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BackendConfig, CircuitBreakerConfig, GatewayConfig, ListenerConfig, ObservabilityConfig,
    RetryConfig, RoutingConfig, TimeoutConfig, ValidationConfig,
};
