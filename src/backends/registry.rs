//! Backend registry.
//!
//! # Responsibilities
//! - Own one entry per backend for the lifetime of the process
//! - Order backends per component type (priority map, then default rank)
//! - Hand out candidates that are currently selectable and under quota
//! - Report per-backend status

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backends::{BackendDescriptor, BackendRuntimeState, CompletionBackend, DisableReason};
use crate::clock::{unix_secs, Clock};
use crate::resilience::{BreakerPolicy, CircuitBreaker, QuotaTracker};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("backend {0} is already registered")]
    DuplicateBackend(String),

    #[error("priority list for {component_type} names unknown backend {backend}")]
    UnknownBackend {
        component_type: String,
        backend: String,
    },
}

/// One registered backend: descriptor, adapter and runtime state.
#[derive(Debug)]
pub struct BackendEntry {
    descriptor: BackendDescriptor,
    client: Arc<dyn CompletionBackend>,
    state: Mutex<BackendRuntimeState>,
}

impl BackendEntry {
    pub fn new(
        descriptor: BackendDescriptor,
        client: Arc<dyn CompletionBackend>,
        max_errors_before_disable: u32,
        now: SystemTime,
    ) -> Self {
        let state = BackendRuntimeState::new(&descriptor, max_errors_before_disable, now);
        Self {
            descriptor,
            client,
            state: Mutex::new(state),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    pub fn client(&self) -> &Arc<dyn CompletionBackend> {
        &self.client
    }

    /// Copy of the current runtime state.
    pub fn snapshot(&self) -> BackendRuntimeState {
        self.lock_state().clone()
    }

    /// Whether the circuit is closed at `now`.
    pub fn is_selectable(&self, now: SystemTime) -> bool {
        self.lock_state().is_selectable(now)
    }

    /// State guard for the resilience layer.
    ///
    /// State is plain counters, so a poisoned lock is still consistent
    /// enough to keep serving.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, BackendRuntimeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Status of a single backend, as exposed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendStatus {
    pub available: bool,
    /// Unix seconds.
    pub disabled_until: Option<u64>,
    pub disabled_reason: Option<DisableReason>,
    pub error_count: u64,
    pub consecutive_failures: u32,
    /// Smallest remaining window budget; `None` means unlimited.
    pub quota_remaining: Option<u32>,
    pub model: String,
    pub priority: u32,
    pub supports_tools: bool,
    /// Unix seconds.
    pub last_success_at: Option<u64>,
}

/// Status of every backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub total_backends: usize,
    pub available_backends: usize,
    pub backends: BTreeMap<String, BackendStatus>,
}

/// Explicit registry context, built once at startup and shared by `Arc`.
#[derive(Debug)]
pub struct BackendRegistry {
    entries: Vec<Arc<BackendEntry>>,
    index: HashMap<String, usize>,
    /// component_type → backend names in preference order.
    priorities: HashMap<String, Vec<String>>,
    breaker: CircuitBreaker,
    quota: QuotaTracker,
    clock: Arc<dyn Clock>,
}

impl BackendRegistry {
    pub fn new(policy: BreakerPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            priorities: HashMap::new(),
            breaker: CircuitBreaker::new(policy, clock.clone()),
            quota: QuotaTracker::new(clock.clone()),
            clock,
        }
    }

    /// Add a backend. Names must be unique.
    pub fn register(
        &mut self,
        descriptor: BackendDescriptor,
        client: Arc<dyn CompletionBackend>,
    ) -> Result<(), RegistryError> {
        let max_errors = self.breaker.policy().max_errors_before_disable;
        self.register_with_threshold(descriptor, client, max_errors)
    }

    /// Add a backend with its own failure threshold.
    pub fn register_with_threshold(
        &mut self,
        descriptor: BackendDescriptor,
        client: Arc<dyn CompletionBackend>,
        max_errors_before_disable: u32,
    ) -> Result<(), RegistryError> {
        if self.index.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateBackend(descriptor.name));
        }

        tracing::info!(
            backend = %descriptor.name,
            model = %descriptor.model,
            priority = descriptor.priority,
            hourly_limit = ?descriptor.hourly_limit,
            daily_limit = ?descriptor.daily_limit,
            "Backend registered"
        );

        let entry = BackendEntry::new(descriptor, client, max_errors_before_disable, self.clock.now());
        self.index.insert(entry.name().to_string(), self.entries.len());
        self.entries.push(Arc::new(entry));
        Ok(())
    }

    /// Set the preferred backend order for one component type.
    pub fn set_priorities(
        &mut self,
        component_type: impl Into<String>,
        backends: Vec<String>,
    ) -> Result<(), RegistryError> {
        let component_type = component_type.into();
        if let Some(unknown) = backends.iter().find(|name| !self.index.contains_key(*name)) {
            return Err(RegistryError::UnknownBackend {
                component_type,
                backend: unknown.clone(),
            });
        }
        self.priorities.insert(component_type, backends);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<BackendEntry>> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<BackendEntry>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Sort key for `entry` under `component_type`: backends named in the
    /// priority map come first in listed order, the rest by default rank.
    pub fn rank(&self, component_type: &str, entry: &BackendEntry) -> (u8, u32) {
        let listed = self
            .priorities
            .get(component_type)
            .and_then(|names| names.iter().position(|name| name == entry.name()));
        match listed {
            Some(position) => (0, position as u32),
            None => (1, entry.descriptor().priority),
        }
    }

    /// Clear every cooldown that has run out.
    pub fn reactivate_expired(&self) {
        for entry in &self.entries {
            if self.breaker.maybe_reactivate(entry) {
                crate::observability::metrics::record_backend_available(entry.name(), true);
            }
        }
    }

    /// Selectable, under-quota backends for `component_type`, best first.
    pub fn candidates(&self, component_type: &str) -> Vec<Arc<BackendEntry>> {
        self.candidates_where(component_type, |_| true)
    }

    /// Like [`candidates`](Self::candidates), restricted to descriptors
    /// accepted by `accept`.
    pub fn candidates_where<F>(&self, component_type: &str, accept: F) -> Vec<Arc<BackendEntry>>
    where
        F: Fn(&BackendDescriptor) -> bool,
    {
        self.reactivate_expired();

        let now = self.clock.now();
        let mut eligible: Vec<Arc<BackendEntry>> = self
            .entries
            .iter()
            .filter(|entry| accept(entry.descriptor()))
            .filter(|entry| entry.is_selectable(now))
            .filter(|entry| self.quota.can_consume(entry))
            .cloned()
            .collect();

        eligible.sort_by_key(|entry| self.rank(component_type, entry));
        eligible
    }

    /// True if at least one backend could take a request right now.
    pub fn is_available(&self) -> bool {
        !self.candidates_where("", |_| true).is_empty()
    }

    pub fn status(&self) -> StatusReport {
        self.reactivate_expired();
        let now = self.clock.now();

        let backends: BTreeMap<String, BackendStatus> = self
            .entries
            .iter()
            .map(|entry| {
                let quota_remaining = self.quota.remaining(entry);
                let state = entry.snapshot();
                let descriptor = entry.descriptor();
                let status = BackendStatus {
                    available: state.is_selectable(now) && quota_remaining != Some(0),
                    disabled_until: state.disabled_until.map(unix_secs),
                    disabled_reason: state.disabled_reason,
                    error_count: state.error_count,
                    consecutive_failures: state.consecutive_failures,
                    quota_remaining,
                    model: descriptor.model.clone(),
                    priority: descriptor.priority,
                    supports_tools: descriptor.supports_tools,
                    last_success_at: state.last_success_at.map(unix_secs),
                };
                (entry.name().to_string(), status)
            })
            .collect();

        StatusReport {
            total_backends: backends.len(),
            available_backends: backends.values().filter(|b| b.available).count(),
            backends,
        }
    }
}
