//! Per-backend request quotas over hourly and daily windows.
//!
//! # Responsibilities
//! - Reset elapsed windows before every check
//! - Answer "may this backend take one more request now"
//! - Count consumed requests without ever exceeding a limit
//!
//! # Design Decisions
//! - Check-and-increment happens under the backend's state mutex, so
//!   concurrent callers cannot both take the last unit
//! - A backend with no configured limits is never quota-bound

use std::sync::Arc;

use thiserror::Error;

use crate::backends::BackendEntry;
use crate::clock::Clock;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuotaError {
    #[error("backend {backend} has used all {limit} requests of its current window")]
    Exhausted { backend: String, limit: u32 },
}

/// Counts requests per backend per window.
#[derive(Debug, Clone)]
pub struct QuotaTracker {
    clock: Arc<dyn Clock>,
}

impl QuotaTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Roll elapsed windows, then report whether every window has room.
    pub fn can_consume(&self, entry: &BackendEntry) -> bool {
        let now = self.clock.now();
        let mut state = entry.lock_state();
        state.windows_mut().for_each(|window| {
            window.roll(now);
        });
        let has_room = state.windows().all(|window| window.has_capacity());
        has_room
    }

    /// Roll elapsed windows, then take one unit from every window.
    pub fn consume(&self, entry: &BackendEntry) -> Result<(), QuotaError> {
        let now = self.clock.now();
        let mut state = entry.lock_state();
        state.windows_mut().for_each(|window| {
            window.roll(now);
        });

        if let Some(full) = state.windows().find(|window| !window.has_capacity()) {
            return Err(QuotaError::Exhausted {
                backend: entry.name().to_string(),
                limit: full.limit,
            });
        }

        state.windows_mut().for_each(|window| window.requests_made += 1);
        Ok(())
    }

    /// Smallest remaining budget across windows; `None` when unlimited.
    pub fn remaining(&self, entry: &BackendEntry) -> Option<u32> {
        let now = self.clock.now();
        let mut state = entry.lock_state();
        state.windows_mut().for_each(|window| {
            window.roll(now);
        });
        let remaining = state.windows().map(|window| window.remaining()).min();
        remaining
    }
}
