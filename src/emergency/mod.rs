//! Deterministic fallback output.
//!
//! Used by the orchestrator once every candidate backend has failed, so a
//! caller always receives a usable, non-empty document.

pub mod templates;

pub use templates::EmergencyTemplates;
