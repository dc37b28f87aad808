//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, trace layers)
//!     → handlers.rs
//!         POST /v1/generate → Orchestrator::generate
//!         GET  /v1/status   → Orchestrator::get_status
//!         GET  /health      → healthy | degraded
//! ```

pub mod handlers;
pub mod server;

pub use server::{AppState, HttpServer};
