//! Graceful HTTP server lifecycle.
//!
//! Serve until a termination signal arrives, then stop accepting, let
//! in-flight requests finish within a deadline, and force close if they
//! don't. Every run ends in exactly one [`ServerError`].

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::ServerConfig;
pub use error::ServerError;
pub use http::HttpServer;
pub use lifecycle::{GracefulRunner, Server, Shutdown};
