//! Mutable per-backend health and quota state.
//!
//! # Responsibilities
//! - Hold availability, failure counters and cooldown deadline
//! - Hold one quota window per configured limit (hourly, daily)
//!
//! Mutation goes through `resilience::quota` and
//! `resilience::circuit_breaker`; everything else reads snapshots.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::backends::BackendDescriptor;

/// Length of the hourly quota window.
pub const HOUR: Duration = Duration::from_secs(60 * 60);

/// Length of the daily quota window.
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Why a backend is currently disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisableReason {
    /// Too many consecutive failures.
    Failures,
    /// The backend reported its quota as spent.
    QuotaExceeded,
}

/// A request budget over a fixed-length window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaWindow {
    pub limit: u32,
    pub length: Duration,
    pub requests_made: u32,
    pub window_start: SystemTime,
}

impl QuotaWindow {
    pub fn new(limit: u32, length: Duration, now: SystemTime) -> Self {
        Self {
            limit,
            length,
            requests_made: 0,
            window_start: now,
        }
    }

    /// Start a fresh window if the current one has elapsed.
    ///
    /// However many windows have passed, this resets once and restarts the
    /// window at `now`. Returns true when a reset happened.
    pub fn roll(&mut self, now: SystemTime) -> bool {
        let elapsed = now.duration_since(self.window_start).unwrap_or_default();
        if elapsed >= self.length {
            self.requests_made = 0;
            self.window_start = now;
            true
        } else {
            false
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.requests_made < self.limit
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.requests_made)
    }
}

/// Runtime state of one backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRuntimeState {
    pub available: bool,
    /// Lifetime failure count.
    pub error_count: u64,
    pub consecutive_failures: u32,
    pub max_errors_before_disable: u32,
    pub disabled_until: Option<SystemTime>,
    pub disabled_reason: Option<DisableReason>,
    pub last_success_at: Option<SystemTime>,
    /// Validation rejections not yet converted into a consecutive failure.
    pub pending_validation_strikes: u32,
    pub hourly: Option<QuotaWindow>,
    pub daily: Option<QuotaWindow>,
}

impl BackendRuntimeState {
    /// Fresh state: available, all counters zero, windows starting at `now`.
    pub fn new(descriptor: &BackendDescriptor, max_errors_before_disable: u32, now: SystemTime) -> Self {
        Self {
            available: true,
            error_count: 0,
            consecutive_failures: 0,
            max_errors_before_disable: max_errors_before_disable.max(1),
            disabled_until: None,
            disabled_reason: None,
            last_success_at: None,
            pending_validation_strikes: 0,
            hourly: descriptor.hourly_limit.map(|limit| QuotaWindow::new(limit, HOUR, now)),
            daily: descriptor.daily_limit.map(|limit| QuotaWindow::new(limit, DAY, now)),
        }
    }

    /// True when the circuit is closed at `now`. Quota is checked separately.
    pub fn is_selectable(&self, now: SystemTime) -> bool {
        self.available && self.disabled_until.map_or(true, |until| now >= until)
    }

    pub fn windows(&self) -> impl Iterator<Item = &QuotaWindow> {
        self.hourly.iter().chain(self.daily.iter())
    }

    pub fn windows_mut(&mut self) -> impl Iterator<Item = &mut QuotaWindow> {
        self.hourly.iter_mut().chain(self.daily.iter_mut())
    }
}
