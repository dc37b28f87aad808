//! Time source shared by the registry, resilience and orchestration layers.
//!
//! Cooldowns, quota windows and backoff delays all read time through a
//! [`Clock`] so that tests can drive them with a [`ManualClock`] instead of
//! waiting on the wall clock.

use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

/// Source of "now" plus an async sleep.
#[async_trait]
pub trait Clock: Debug + Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> SystemTime;

    /// Suspend the calling task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Real time, backed by `SystemTime` and Tokio timers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A clock that only moves when told to.
///
/// `sleep` returns immediately after advancing the clock by the requested
/// duration and records the delay, so backoff schedules can be asserted.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<SystemTime>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    /// Start at an arbitrary fixed instant (2023-11-14T22:13:20Z).
    pub fn new() -> Self {
        Self::starting_at(UNIX_EPOCH + Duration::from_secs(1_700_000_000))
    }

    pub fn starting_at(start: SystemTime) -> Self {
        Self {
            current: Mutex::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current += by;
    }

    /// Every delay passed to [`Clock::sleep`] so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        self.advance(duration);
    }
}

/// Seconds since the Unix epoch, as reported by the status endpoint.
pub fn unix_secs(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
