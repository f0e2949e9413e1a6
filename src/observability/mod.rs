//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields: address, connection_id, error)
//!
//! Consumers:
//!     → logging.rs (fmt subscriber on stdout, filtered by RUST_LOG)
//! ```

pub mod logging;
