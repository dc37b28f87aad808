//! Scripted in-process backend for tests and local runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::backends::{BackendError, BackendErrorKind, CompletionBackend};

/// Backend that plays back a script of replies, then repeats a fallback.
#[derive(Debug)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, BackendError>>>,
    fallback: Result<String, BackendError>,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl ScriptedBackend {
    /// Always answer with `reply`.
    pub fn always(reply: Result<String, BackendError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: reply,
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::always(Ok(text.into()))
    }

    pub fn failing(kind: BackendErrorKind) -> Self {
        Self::always(Err(BackendError::new(kind, format!("scripted {kind}"))))
    }

    /// Queue a reply ahead of the fallback.
    pub fn then(self, reply: Result<String, BackendError>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
        self
    }

    /// Queue `count` failures of `kind` ahead of the fallback.
    pub fn then_fail(self, kind: BackendErrorKind, count: usize) -> Self {
        (0..count).fold(self, |backend, _| {
            backend.then(Err(BackendError::new(kind, format!("scripted {kind}"))))
        })
    }

    /// Sleep (on the Tokio timer) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `complete` calls received.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(
        &self,
        _prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
