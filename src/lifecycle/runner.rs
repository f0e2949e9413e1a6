//! Graceful run of a server: serve until stopped or signalled, then drain.
//!
//! # Responsibilities
//! - Race the serve loop against a termination signal
//! - On signal: disable keep-alive, drain within the timeout, force close on failure
//! - Produce exactly one terminal [`ServerError`] per run
//!
//! # Design Decisions
//! - The serve outcome travels through the serve task's `JoinHandle`, a
//!   single-slot handoff that never blocks the task, even when nobody reads it
//! - A force-close error replaces the graceful-stop error; they are not combined
//! - Errors are returned, never logged here

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ServerError;
use crate::lifecycle::signals::TerminationSignals;

/// Operations a server must offer to be run gracefully.
///
/// Implementations own their synchronisation: `serve` runs on its own task
/// while the other methods are called from the runner.
pub trait Server: Send + Sync + 'static {
    /// Serve until the server stops. Always ends in an error;
    /// [`ServerError::Closed`] when stopped by `shutdown` or `close`.
    fn serve(&self) -> impl Future<Output = ServerError> + Send;

    /// Enable or disable keep-alive for connections. Idempotent.
    fn set_keep_alives_enabled(&self, enabled: bool);

    /// Stop accepting and wait for in-flight requests, giving up at `deadline`.
    fn shutdown(&self, deadline: Instant) -> impl Future<Output = Result<(), ServerError>> + Send;

    /// Drop every connection immediately.
    fn close(&self) -> impl Future<Output = Result<(), ServerError>> + Send;
}

/// Runs a [`Server`] once and shuts it down gracefully on a termination signal.
pub struct GracefulRunner<S> {
    server: Arc<S>,
    timeout: Duration,
}

impl<S: Server> GracefulRunner<S> {
    /// `timeout` bounds the graceful stop and must be positive; a zero
    /// timeout makes every drain fail immediately.
    pub fn new(server: S, timeout: Duration) -> Self {
        Self::with_shared(Arc::new(server), timeout)
    }

    /// Like [`GracefulRunner::new`] for a server the caller keeps a handle to.
    pub fn with_shared(server: Arc<S>, timeout: Duration) -> Self {
        Self { server, timeout }
    }

    /// Serve until the server stops on its own or the process receives
    /// SIGINT/SIGTERM, and return how it ended.
    ///
    /// The signal subscription lives for this call only.
    pub async fn run(self) -> ServerError {
        let mut signals = match TerminationSignals::register() {
            Ok(signals) => signals,
            Err(e) => return ServerError::Signal(e),
        };

        self.run_until(async move {
            let termination = signals.recv().await;
            tracing::info!(signal = %termination, "Termination signal received");
        })
        .await
    }

    /// Serve until the server stops on its own or `signal` resolves.
    ///
    /// If the server stops first its outcome is returned and no shutdown
    /// step runs. Otherwise keep-alive is disabled, the server gets
    /// `timeout` to drain, and a failed drain is followed by a force close.
    /// A drain or close error is returned without waiting for the serve
    /// loop; after a clean drain the serve loop's own outcome is returned.
    pub async fn run_until<F>(self, signal: F) -> ServerError
    where
        F: Future<Output = ()>,
    {
        let server = Arc::clone(&self.server);
        let mut serving = tokio::spawn(async move { server.serve().await });

        tokio::select! {
            outcome = &mut serving => {
                let err = outcome.unwrap_or_else(ServerError::from);
                tracing::debug!(error = %err, "Server stopped before any shutdown signal");
                return err;
            }
            _ = signal => {}
        }

        tracing::debug!(timeout = ?self.timeout, "Starting graceful shutdown");
        self.server.set_keep_alives_enabled(false);
        let deadline = Instant::now() + self.timeout;

        let mut failure = None;
        if let Err(e) = self.server.shutdown(deadline).await {
            tracing::debug!(error = %e, "Graceful shutdown failed, forcing close");
            failure = Some(e);
            if let Err(e) = self.server.close().await {
                failure = Some(e);
            }
        }

        if let Some(err) = failure {
            // The serve task unblocks on its own once the server is closed.
            return err;
        }

        serving.await.unwrap_or_else(ServerError::from)
    }
}
