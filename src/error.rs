//! Terminal outcomes of serving and shutting down.

use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinError;

/// Every way a serve loop or a graceful run can end.
///
/// Serving always ends in an error: [`ServerError::Closed`] is the sentinel
/// for an intentional stop and is the only variant a clean run produces.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The server was shut down or closed on purpose.
    #[error("server closed")]
    Closed,

    /// The bind address could not be parsed.
    #[error("invalid bind address {addr:?}: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Accepting connections failed with a non-transient error.
    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    /// Connections did not drain before the shutdown deadline.
    #[error("graceful shutdown timed out after {0:?}")]
    ShutdownTimeout(Duration),

    /// Force close could not release every connection.
    #[error("force close failed: {0}")]
    Close(String),

    /// Subscribing to OS termination signals failed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    /// The serve task panicked or was cancelled before reporting.
    #[error("serve task failed: {0}")]
    ServeTask(#[from] JoinError),
}

impl ServerError {
    /// Whether this is the intentional-stop sentinel.
    pub fn is_closed(&self) -> bool {
        matches!(self, ServerError::Closed)
    }
}
