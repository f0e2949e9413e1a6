//! Graceful HTTP server.
//!
//! # Architecture Overview
//!
//! ```text
//!   SIGINT / SIGTERM ─────────────┐
//!                                 ▼
//!   ┌──────────┐   serve    ┌───────────┐   keep-alive off
//!   │ listener │◀───────────│  runner   │── shutdown(deadline)
//!   │ + conns  │            │           │── close() on failure
//!   └──────────┘            └─────┬─────┘
//!                                 ▼
//!                     one ServerError → exit status
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use graceful_server::config::{self, ConfigError, ConfigOverrides, ServerConfig};
use graceful_server::http::{build_router, HttpServer};
use graceful_server::lifecycle::GracefulRunner;
use graceful_server::observability::logging;

#[derive(Parser)]
#[command(name = "graceful-server")]
#[command(about = "HTTP server that drains in-flight requests on SIGINT/SIGTERM", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address, overrides `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Seconds in-flight requests get after a signal, overrides `shutdown.timeout_secs`.
    #[arg(short = 't', long)]
    shutdown_timeout: Option<u64>,

    /// Log level, overrides `observability.log_level`.
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Cli {
    fn load(&self) -> Result<ServerConfig, ConfigError> {
        let overrides = ConfigOverrides {
            bind_address: self.bind.clone(),
            shutdown_timeout_secs: self.shutdown_timeout,
            log_level: self.log_level.clone(),
        };
        config::load_with_overrides(self.config.as_deref(), &overrides)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("graceful-server: {}", e);
            return ExitCode::from(2);
        }
    };

    logging::init(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        shutdown_timeout_secs = config.shutdown.timeout_secs,
        "Configuration loaded"
    );

    let server = HttpServer::new(&config.listener, build_router(&config.timeouts));
    let runner = GracefulRunner::new(server, config.shutdown.timeout());

    let outcome = runner.run().await;
    if outcome.is_closed() {
        tracing::info!("Shutdown complete");
        ExitCode::SUCCESS
    } else {
        tracing::error!(error = %outcome, "Server stopped with error");
        ExitCode::FAILURE
    }
}
