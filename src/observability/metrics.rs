//! Metrics collection and exposition.
//!
//! # Metrics
//! - `textgen_attempts_total` (counter): backend calls by backend, outcome
//! - `textgen_generations_total` (counter): finished requests by component type, mode
//! - `textgen_generation_duration_seconds` (histogram): end-to-end latency
//! - `textgen_backend_available` (gauge): 1=circuit closed, 0=open
//!
//! Without an installed recorder every call here is a no-op, so library
//! users and tests pay nothing.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// One backend call. `outcome` is `success` or a failure kind.
pub fn record_attempt(backend: &str, outcome: &str) {
    counter!(
        "textgen_attempts_total",
        "backend" => backend.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// One finished `generate` call. `mode` is `backend` or `emergency`.
pub fn record_generation(component_type: &str, mode: &'static str, elapsed: Duration) {
    counter!(
        "textgen_generations_total",
        "component_type" => component_type.to_string(),
        "mode" => mode
    )
    .increment(1);
    histogram!("textgen_generation_duration_seconds", "mode" => mode).record(elapsed.as_secs_f64());
}

pub fn record_backend_available(backend: &str, available: bool) {
    gauge!("textgen_backend_available", "backend" => backend.to_string())
        .set(if available { 1.0 } else { 0.0 });
}
