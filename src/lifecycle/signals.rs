//! OS signal handling.
//!
//! # Responsibilities
//! - Subscribe to SIGINT (Ctrl+C) and SIGTERM
//! - Report which one arrived first
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Subscriptions are created per run and dropped with it
//! - Non-Unix platforms only get Ctrl+C

use std::fmt;
use std::io;

/// The termination request that ended a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// SIGINT / Ctrl+C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Interrupt => write!(f, "SIGINT"),
            Termination::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Live subscription to the process termination signals.
pub struct TerminationSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl TerminationSignals {
    /// Register interest in SIGINT and SIGTERM.
    ///
    /// Must be called from within a Tokio runtime.
    #[cfg(unix)]
    pub fn register() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn register() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the first termination signal.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> Termination {
        tokio::select! {
            _ = self.interrupt.recv() => Termination::Interrupt,
            _ = self.terminate.recv() => Termination::Terminate,
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> Termination {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Termination::Interrupt,
            // No handler means no signal will ever come.
            Err(_) => std::future::pending().await,
        }
    }
}
