//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::listener)
//!     → server.rs (accept loop, hyper connection per task, drain/close)
//!     → router.rs (axum Router: trace + timeout layers, handlers)
//!     → Send to client
//! ```

pub mod router;
pub mod server;

pub use router::build_router;
pub use server::HttpServer;
