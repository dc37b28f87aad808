//! Generation orchestrator.
//!
//! # Flow
//! ```text
//! SELECT ─▶ ATTEMPT ─▶ SUCCESS ─▶ DONE
//!   ▲          │
//!   │          ├─▶ RETRY (same backend, after backoff)
//!   │          └─▶ NEXT_BACKEND
//!   └──────────────────┘
//! no candidates left ─▶ EMERGENCY ─▶ DONE
//! budget spent        ─▶ EMERGENCY ─▶ DONE
//! ```
//!
//! Every generation runs against one overall budget. Attempt deadlines are
//! clamped to what is left of it, and a backoff that would overrun it ends
//! the search early, so the emergency template always arrives in time.
//!
//! The orchestrator never touches backend state itself. Quota and breaker
//! bookkeeping go through the registry's [`QuotaTracker`](crate::resilience::QuotaTracker) and
//! [`CircuitBreaker`](crate::resilience::CircuitBreaker).

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::backends::{BackendEntry, BackendRegistry, StatusReport};
use crate::emergency::EmergencyTemplates;
use crate::observability::metrics;
use crate::orchestrator::types::{
    AttemptOutcome, GenerationRequest, GenerationResult, EMERGENCY_BACKEND,
};
use crate::quality::ContentValidator;
use crate::resilience::timeouts::with_deadline;
use crate::resilience::{FailureKind, RetryPolicy};

/// Default per-attempt deadline.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default budget for one generation across all backends.
pub const DEFAULT_GENERATION_BUDGET: Duration = Duration::from_secs(300);

/// Shared entry point for text generation.
#[derive(Debug)]
pub struct Orchestrator {
    registry: Arc<BackendRegistry>,
    validator: Arc<ContentValidator>,
    templates: EmergencyTemplates,
    retry: RetryPolicy,
    attempt_timeout: Duration,
    generation_budget: Duration,
}

impl Orchestrator {
    pub fn new(registry: Arc<BackendRegistry>, validator: Arc<ContentValidator>) -> Self {
        Self {
            registry,
            validator,
            templates: EmergencyTemplates::new(),
            retry: RetryPolicy::default(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            generation_budget: DEFAULT_GENERATION_BUDGET,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_generation_budget(mut self, budget: Duration) -> Self {
        self.generation_budget = budget;
        self
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    pub fn validator(&self) -> &Arc<ContentValidator> {
        &self.validator
    }

    pub fn templates(&self) -> &EmergencyTemplates {
        &self.templates
    }

    pub fn get_status(&self) -> StatusReport {
        self.registry.status()
    }

    pub fn is_available(&self) -> bool {
        self.registry.is_available()
    }

    /// Produce text for `request`. Never fails: once every candidate is
    /// spent the emergency template is returned instead.
    pub async fn generate(&self, request: GenerationRequest) -> GenerationResult {
        self.generate_with_id(request, Uuid::new_v4()).await
    }

    /// [`generate`](Self::generate) under a caller-supplied request id.
    pub async fn generate_with_id(
        &self,
        request: GenerationRequest,
        request_id: Uuid,
    ) -> GenerationResult {
        let span = tracing::info_span!(
            "generate",
            request_id = %request_id,
            component_type = %request.component_type,
        );
        self.run(request, request_id).instrument(span).await
    }

    async fn run(&self, request: GenerationRequest, request_id: Uuid) -> GenerationResult {
        let clock = self.registry.clock().clone();
        let started = clock.now();
        let elapsed = || clock.now().duration_since(started).unwrap_or_default();
        let deadline = Instant::now() + self.generation_budget;

        let candidates = self.candidate_order(&request);
        tracing::debug!(
            candidates = ?candidates.iter().map(|e| e.name()).collect::<Vec<_>>(),
            "Candidate list built"
        );

        let mut attempts = 0u32;
        'candidates: for entry in candidates {
            let mut tries = 0u32;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    tracing::warn!(attempts, "Generation budget spent");
                    break 'candidates;
                }
                // A concurrent request may have opened the circuit since selection.
                if !entry.is_selectable(clock.now()) {
                    break;
                }
                if let Err(e) = self.registry.quota().consume(&entry) {
                    tracing::debug!(backend = %entry.name(), error = %e, "Skipping backend");
                    break;
                }
                tries += 1;
                attempts += 1;

                let limit = self.attempt_timeout.min(remaining);
                match self.attempt(&entry, &request, limit).await {
                    AttemptOutcome::Success(text) => {
                        self.registry.breaker().record_success(&entry);
                        metrics::record_attempt(entry.name(), "success");

                        let elapsed = elapsed();
                        metrics::record_generation(&request.component_type, "backend", elapsed);
                        tracing::info!(
                            backend = %entry.name(),
                            attempts,
                            elapsed_ms = elapsed.as_millis() as u64,
                            "Generation succeeded"
                        );
                        return GenerationResult {
                            text,
                            backend_used: entry.name().to_string(),
                            model: Some(entry.descriptor().model.clone()),
                            attempts,
                            elapsed_ms: elapsed.as_millis() as u64,
                            emergency_mode: false,
                            request_id,
                        };
                    }
                    AttemptOutcome::Failure { kind, message } => {
                        metrics::record_attempt(entry.name(), kind.as_str());
                        tracing::warn!(
                            backend = %entry.name(),
                            attempt = tries,
                            kind = %kind,
                            error = %message,
                            "Attempt failed"
                        );

                        let opened = self.registry.breaker().record_failure(&entry, kind);
                        if opened {
                            metrics::record_backend_available(entry.name(), false);
                        }
                        if opened || !self.retry.should_retry(kind, tries) {
                            break;
                        }

                        let delay = self.retry.delay_for(tries);
                        if delay >= deadline.saturating_duration_since(Instant::now()) {
                            tracing::warn!(
                                backend = %entry.name(),
                                delay_ms = delay.as_millis() as u64,
                                "Backoff would overrun the generation budget"
                            );
                            break 'candidates;
                        }
                        tracing::info!(
                            backend = %entry.name(),
                            attempt = tries,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying same backend"
                        );
                        clock.sleep(delay).await;
                    }
                }
            }
        }

        let text = self.templates.render(&request.component_type, &request.context);
        let elapsed = elapsed();
        metrics::record_generation(&request.component_type, "emergency", elapsed);
        tracing::error!(
            error = "all_backends_exhausted",
            attempts,
            "No backend produced acceptable output, using emergency template"
        );

        GenerationResult {
            text,
            backend_used: EMERGENCY_BACKEND.to_string(),
            model: None,
            attempts,
            elapsed_ms: elapsed.as_millis() as u64,
            emergency_mode: true,
            request_id,
        }
    }

    /// Best-fit backend first, then the rest by fewest consecutive
    /// failures, ties broken by rank.
    fn candidate_order(&self, request: &GenerationRequest) -> Vec<Arc<BackendEntry>> {
        let component_type = request.component_type.as_str();
        let mut candidates = if request.require_tools {
            self.registry
                .candidates_where(component_type, |descriptor| descriptor.supports_tools)
        } else {
            self.registry.candidates(component_type)
        };

        if candidates.len() > 1 {
            let mut rest = candidates.split_off(1);
            rest.sort_by_cached_key(|entry| {
                (
                    entry.lock_state().consecutive_failures,
                    self.registry.rank(component_type, entry),
                )
            });
            candidates.extend(rest);
        }
        candidates
    }

    async fn attempt(
        &self,
        entry: &BackendEntry,
        request: &GenerationRequest,
        limit: Duration,
    ) -> AttemptOutcome {
        let call = entry
            .client()
            .complete(&request.prompt, request.max_tokens, request.temperature);

        let text = match with_deadline(limit, call).await {
            Ok(text) => text,
            Err(e) => return AttemptOutcome::failure(e.kind.into(), e.message),
        };
        if text.trim().is_empty() {
            return AttemptOutcome::failure(FailureKind::InvalidResponse, "empty response");
        }

        let verdict = self.validator.validate(&text, &request.component_type);
        match verdict.reason {
            None => AttemptOutcome::Success(text),
            Some(reason) => AttemptOutcome::failure(FailureKind::ValidationRejected, reason.to_string()),
        }
    }
}
