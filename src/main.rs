//! Text-generation gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────┐
//!                 │                      GATEWAY                             │
//!   POST          │  ┌─────────┐    ┌──────────────┐    ┌─────────────────┐  │
//!   /v1/generate ─┼─▶│  http   │───▶│ orchestrator │───▶│ backends        │──┼──▶ completion
//!                 │  │ server  │    │   engine     │    │ registry + http │  │    endpoints
//!                 │  └─────────┘    └──────┬───────┘    └─────────────────┘  │
//!                 │                        │                                 │
//!                 │          ┌─────────────┼──────────────┐                  │
//!                 │          ▼             ▼              ▼                  │
//!                 │   ┌─────────────┐ ┌───────────┐ ┌────────────┐           │
//!                 │   │ resilience  │ │  quality  │ │ emergency  │           │
//!                 │   │quota/breaker│ │ validator │ │ templates  │           │
//!                 │   │retry/backoff│ └───────────┘ └────────────┘           │
//!                 │   └─────────────┘                                        │
//!                 │                                                          │
//!                 │   config (+ watcher) · observability · lifecycle         │
//!                 └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use textgen_gateway::clock::SystemClock;
use textgen_gateway::config::{load_config, watcher::ConfigWatcher, GatewayConfig};
use textgen_gateway::http::HttpServer;
use textgen_gateway::lifecycle::{build_orchestrator, signals, Shutdown};
use textgen_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "textgen-gateway", version)]
#[command(about = "Resilient text-generation gateway", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "textgen-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.backends.len(),
        attempt_timeout_secs = config.timeouts.attempt_secs,
        max_attempts = config.retries.max_attempts,
        "Configuration loaded"
    );
    if config.backends.is_empty() {
        tracing::warn!("No backends configured; every request will use emergency templates");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let orchestrator = Arc::new(build_orchestrator(&config, Arc::new(SystemClock))?);
    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    // Keep the watcher alive for the life of the server.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) =
                ConfigWatcher::with_current(path, Some(config.validation.clone()));
            let validator = orchestrator.validator().clone();
            let stopped = shutdown.signalled();
            tokio::spawn(async move {
                tokio::pin!(stopped);
                loop {
                    tokio::select! {
                        _ = &mut stopped => break,
                        update = updates.recv() => match update {
                            Some(policy) => validator.update_policy(policy),
                            None => break,
                        },
                    }
                }
            });
            match watcher.run() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::error!(error = %e, "Config watcher failed to start, hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(&config, orchestrator);
    server.run(listener, shutdown.signalled()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
