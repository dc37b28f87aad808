//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use textgen_gateway::backends::mock::ScriptedBackend;
use textgen_gateway::backends::{BackendDescriptor, BackendRegistry, CompletionBackend};
use textgen_gateway::clock::ManualClock;
use textgen_gateway::orchestrator::Orchestrator;
use textgen_gateway::quality::ContentValidator;
use textgen_gateway::resilience::BreakerPolicy;

/// Text that passes every default validation threshold for any
/// component type: > 500 chars, diverse, multi-line.
pub fn rich_text(topic: &str) -> String {
    (0..40)
        .map(|i| format!("- Step {i}: {topic} insight{i} drives outcome{i} via lever{i}."))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Registry on a manual clock with default breaker policy.
pub fn registry(
    clock: &Arc<ManualClock>,
    backends: Vec<(BackendDescriptor, Arc<dyn CompletionBackend>)>,
) -> BackendRegistry {
    let mut registry = BackendRegistry::new(BreakerPolicy::default(), clock.clone());
    for (descriptor, backend) in backends {
        registry.register(descriptor, backend).unwrap();
    }
    registry
}

pub fn orchestrator(registry: BackendRegistry) -> Orchestrator {
    Orchestrator::new(Arc::new(registry), Arc::new(ContentValidator::default()))
}

/// Shorthand for a registry entry backed by a scripted backend.
pub fn scripted(
    name: &str,
    priority: u32,
    backend: &Arc<ScriptedBackend>,
) -> (BackendDescriptor, Arc<dyn CompletionBackend>) {
    (
        BackendDescriptor::new(name, format!("{name}-model"), priority),
        backend.clone() as Arc<dyn CompletionBackend>,
    )
}

/// Start a completion endpoint on an ephemeral port. `f` returns the
/// status code and body for each request, in arrival order.
pub async fn start_completion_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        read_request(&mut socket).await;
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            402 => "402 Payment Required",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "400 Bad Request",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Drain headers and a `Content-Length` body so the client sees a clean exchange.
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= header_end + 4 + content_length {
            return;
        }
    }
}
