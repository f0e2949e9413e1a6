//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Run (runner.rs):
//!     spawn serve ──┬── serve ends first      → return its error
//!                   └── signal arrives first  → keep-alive off
//!                                             → shutdown(deadline)
//!                                             → close() if that failed
//!                                             → return error, or serve's outcome
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → first one ends the wait
//!
//! Shutdown (shutdown.rs):
//!     trigger() → in-process replacement for a signal
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: forced close after deadline
//! - Exactly one terminal error per run

pub mod runner;
pub mod shutdown;
pub mod signals;

pub use runner::{GracefulRunner, Server};
pub use shutdown::Shutdown;
pub use signals::{Termination, TerminationSignals};
