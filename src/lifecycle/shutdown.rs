//! Shutdown coordination.

use tokio::sync::broadcast;

/// Fan-out of a single shutdown event to every long-running task
/// (HTTP server, policy reload loop).
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Future that resolves once [`trigger`](Self::trigger) is called.
    pub fn signalled(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.subscribe();
        async move {
            // A closed channel means the coordinator is gone; stop as well.
            let _ = rx.recv().await;
        }
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_wakes_all_waiters() {
        let shutdown = Shutdown::new();
        let first = tokio::spawn(shutdown.signalled());
        let second = tokio::spawn(shutdown.signalled());
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();
        first.await.unwrap();
        second.await.unwrap();
    }
}
