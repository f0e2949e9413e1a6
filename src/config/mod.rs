//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → ConfigOverrides (CLI flags from main.rs)
//!     → validation.rs (semantic checks, once, on the merged config)
//!     → ServerConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_with_overrides, read_config, ConfigError, ConfigOverrides};
pub use schema::ServerConfig;
pub use schema::ListenerConfig;
pub use schema::ShutdownConfig;
pub use validation::{validate_config, ValidationError};
