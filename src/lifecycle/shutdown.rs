//! Programmatic shutdown trigger.

use std::future::Future;

use tokio::sync::broadcast;

/// Coordinator for requesting shutdown from inside the process.
///
/// Provides a broadcast channel that any number of waiters can subscribe
/// to; [`Shutdown::signal`] plugs into [`GracefulRunner::run_until`].
///
/// [`GracefulRunner::run_until`]: crate::lifecycle::GracefulRunner::run_until
#[derive(Debug, Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Only current subscribers see it.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// A future resolving on the next [`Shutdown::trigger`].
    ///
    /// Subscribes immediately. If every coordinator handle is dropped
    /// without triggering, the future never resolves.
    pub fn signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.subscribe();
        async move {
            match rx.recv().await {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => std::future::pending().await,
            }
        }
    }

    /// Get the number of active subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
