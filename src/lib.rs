//! Resilient text-generation gateway library.

pub mod backends;
pub mod clock;
pub mod config;
pub mod emergency;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod orchestrator;
pub mod quality;
pub mod resilience;

pub use backends::{BackendRegistry, CompletionBackend};
pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use orchestrator::{GenerationRequest, GenerationResult, Orchestrator};
