//! Per-attempt deadline for backend calls.
//!
//! An attempt that outlives its deadline is dropped and reported as a
//! transient failure, so the orchestrator moves on to its next retry or
//! candidate instead of waiting on a stuck backend.

use std::future::Future;
use std::time::Duration;

use crate::backends::BackendError;

/// Run a backend call with a deadline.
pub async fn with_deadline<F>(limit: Duration, call: F) -> Result<String, BackendError>
where
    F: Future<Output = Result<String, BackendError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::transient(format!(
            "no response within {}s",
            limit.as_secs_f32()
        ))),
    }
}
