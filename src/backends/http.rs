//! Vendor-neutral HTTP completion adapter.
//!
//! # Responsibilities
//! - POST `{model, prompt, max_tokens, temperature}` as JSON to an endpoint
//! - Read `{"text": ...}` back
//! - Translate HTTP failures into `BackendErrorKind`
//!
//! # Design Decisions
//! - Vendor SDKs live behind a sidecar speaking this shape; no vendor
//!   protocol is implemented here
//! - 4xx other than 402/408/429 are fatal: retrying will not fix them
//! - The per-attempt deadline is enforced by the orchestrator, not here

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::backends::{BackendError, CompletionBackend};

#[derive(Debug, Serialize)]
struct CompletionPayload<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionReply {
    text: String,
}

/// Adapter for one HTTP completion endpoint.
#[derive(Debug, Clone)]
pub struct HttpCompletionBackend {
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpCompletionBackend {
    pub fn new(
        endpoint: Url,
        model: impl Into<String>,
        api_key: Option<String>,
        connect_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| BackendError::fatal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint,
            model: model.into(),
            api_key,
            client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError> {
        let payload = CompletionPayload {
            model: &self.model,
            prompt,
            max_tokens,
            temperature,
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_builder() {
                BackendError::fatal(format!("invalid request: {e}"))
            } else {
                BackendError::transient(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            let reply: CompletionReply = response
                .json()
                .await
                .map_err(|e| BackendError::fatal(format!("malformed completion reply: {e}")))?;
            return Ok(reply.text);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }
}

/// Map a non-success HTTP status (and its body) onto a backend error.
pub fn classify_status(status: StatusCode, body: &str) -> BackendError {
    let snippet: String = body.chars().take(200).collect();
    let message = format!("HTTP {status}: {snippet}");
    let mentions_quota = {
        let lower = body.to_lowercase();
        lower.contains("quota") || lower.contains("billing") || lower.contains("insufficient credits")
    };

    match status {
        StatusCode::PAYMENT_REQUIRED => BackendError::quota_exceeded(message),
        StatusCode::TOO_MANY_REQUESTS if mentions_quota => BackendError::quota_exceeded(message),
        StatusCode::TOO_MANY_REQUESTS => BackendError::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT => BackendError::transient(message),
        s if s.is_server_error() => BackendError::transient(message),
        _ => BackendError::fatal(message),
    }
}
