//! Hot reload of the `[validation]` section.
//!
//! Backends and routing are fixed for the life of the process. When the
//! file changes it is re-read and fully validated; only a quality policy
//! that differs from the last one pushed reaches subscribers. A file that
//! fails to parse or validate leaves the running policy in place.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ValidationConfig;

/// Re-reads the config file and decides whether the quality policy moved.
#[derive(Debug)]
pub struct PolicyReloader {
    path: PathBuf,
    current: Option<ValidationConfig>,
}

impl PolicyReloader {
    pub fn new(path: &Path, current: Option<ValidationConfig>) -> Self {
        Self {
            path: path.to_path_buf(),
            current,
        }
    }

    /// The new policy, or `None` when the file is unusable or the
    /// `[validation]` section is unchanged.
    pub fn reload(&mut self) -> Option<ValidationConfig> {
        let policy = match load_config(&self.path) {
            Ok(config) => config.validation,
            Err(e) => {
                tracing::error!(path = ?self.path, error = %e, "Config reload rejected, keeping current policy");
                return None;
            }
        };
        if self.current.as_ref() == Some(&policy) {
            tracing::debug!("Validation policy unchanged");
            return None;
        }
        self.current = Some(policy.clone());
        Some(policy)
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    kind.is_modify() || kind.is_create()
}

/// Watches the config file and streams validation policy updates.
pub struct ConfigWatcher {
    reloader: PolicyReloader,
    update_tx: mpsc::UnboundedSender<ValidationConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end for policy updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ValidationConfig>) {
        Self::with_current(path, None)
    }

    /// Like [`new`](Self::new), but `current` is not re-sent if the file
    /// still carries it.
    pub fn with_current(
        path: &Path,
        current: Option<ValidationConfig>,
    ) -> (Self, mpsc::UnboundedReceiver<ValidationConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                reloader: PolicyReloader::new(path, current),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. Updates stop when the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            mut reloader,
            update_tx,
        } = self;
        let path = reloader.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_content_change(&event.kind) => {
                    if let Some(policy) = reloader.reload() {
                        tracing::info!("Validation policy reloaded");
                        if update_tx.send(policy).is_err() {
                            tracing::debug!("Policy receiver gone");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}
