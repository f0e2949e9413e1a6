//! HTTP server with graceful shutdown hooks.
//!
//! # Responsibilities
//! - Bind the listener and run the accept loop
//! - Serve each connection (HTTP/1.1 and HTTP/2) on its own task
//! - Track connections so shutdown can wait for them
//! - Expose keep-alive, drain and force-close controls to the runner
//!
//! # Design Decisions
//! - Bind happens inside `serve` so bind failures are the serve outcome
//! - One watch channel broadcasts the connection state to every connection
//! - Transient accept errors back off and retry; anything else ends serving
//! - HTTP/2 streams run on tasks the server owns, so force close can abort them

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use hyper_util::{
    rt::TokioIo,
    server::conn::auto,
    service::TowerToHyperService,
};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::config::ListenerConfig;
use crate::error::ServerError;
use crate::lifecycle::Server;
use crate::net::backoff::calculate_backoff;
use crate::net::listener::{is_transient_accept_error, ConnectionPermit, Listener};
use crate::net::{ConnectionState, ConnectionTracker};

/// How long `close` waits for connection tasks to release their sockets.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

const ACCEPT_BACKOFF_BASE_MS: u64 = 5;
const ACCEPT_BACKOFF_MAX_MS: u64 = 1000;

/// Executor for the tasks hyper spawns per connection (HTTP/2 streams).
///
/// Keeps their abort handles so a force close can stop handlers that
/// would otherwise outlive their connection.
#[derive(Clone, Default)]
struct StreamExecutor {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl StreamExecutor {
    fn abort_all(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let running = tasks.len();
        tasks.abort_all();
        running
    }
}

impl<F> hyper::rt::Executor<F> for StreamExecutor
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    fn execute(&self, fut: F) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        // Reap finished streams so the set only holds live ones.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let _ = fut.await;
        });
    }
}

/// HTTP server serving an axum [`Router`].
pub struct HttpServer {
    bind_address: String,
    max_connections: usize,
    router: Router,
    keep_alive: AtomicBool,
    state: watch::Sender<ConnectionState>,
    connections: ConnectionTracker,
    streams: StreamExecutor,
    bound: watch::Sender<Option<SocketAddr>>,
}

impl HttpServer {
    /// Create a server for `router`. Nothing is bound until [`Server::serve`].
    pub fn new(config: &ListenerConfig, router: Router) -> Self {
        let (state, _) = watch::channel(ConnectionState::Active);
        let (bound, _) = watch::channel(None);
        Self {
            bind_address: config.bind_address.clone(),
            max_connections: config.max_connections,
            router,
            keep_alive: AtomicBool::new(true),
            state,
            connections: ConnectionTracker::new(),
            streams: StreamExecutor::default(),
            bound,
        }
    }

    /// Address the listener is bound to, once `serve` has bound it.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.bound.borrow()
    }

    /// Wait until `serve` has bound the listener.
    ///
    /// Never resolves if binding fails.
    pub async fn listening(&self) -> SocketAddr {
        let mut rx = self.bound.subscribe();
        loop {
            let current = *rx.borrow_and_update();
            if let Some(addr) = current {
                return addr;
            }
            // `self` owns the sender, so the channel stays open.
            let _ = rx.changed().await;
        }
    }

    /// Number of connections currently open.
    pub fn active_connections(&self) -> usize {
        self.connections.active_count()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn keep_alives_enabled(&self) -> bool {
        self.keep_alive.load(Ordering::SeqCst)
    }

    /// Move the state forward. Returns false if it was already there or past it.
    fn advance(&self, to: ConnectionState) -> bool {
        self.state.send_if_modified(|state| {
            if *state < to {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        let guard = self.connections.track();
        let mut state = self.state.subscribe();
        let keep_alive = self.keep_alives_enabled();
        let service = TowerToHyperService::new(self.router.clone());
        let executor = self.streams.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let id = guard.id();

            let mut builder = auto::Builder::new(executor);
            builder.http1().keep_alive(keep_alive);
            let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
            tokio::pin!(conn);

            let mut draining = false;
            loop {
                let current = *state.borrow_and_update();
                match current {
                    ConnectionState::Closed => {
                        tracing::debug!(connection_id = %id, peer_addr = %peer, "Connection force closed");
                        break;
                    }
                    ConnectionState::Draining if !draining => {
                        conn.as_mut().graceful_shutdown();
                        draining = true;
                    }
                    _ => {}
                }

                tokio::select! {
                    result = conn.as_mut() => {
                        if let Err(e) = result {
                            tracing::debug!(connection_id = %id, peer_addr = %peer, error = %e, "Connection error");
                        }
                        break;
                    }
                    changed = state.changed() => {
                        if changed.is_err() {
                            // Server dropped: nobody can drain or close us any more.
                            let _ = conn.as_mut().await;
                            break;
                        }
                    }
                }
            }

            drop(guard);
        });
    }
}

impl Server for HttpServer {
    async fn serve(&self) -> ServerError {
        let mut state = self.state.subscribe();
        if *state.borrow_and_update() != ConnectionState::Active {
            return ServerError::Closed;
        }

        let addr: SocketAddr = match self.bind_address.parse() {
            Ok(addr) => addr,
            Err(source) => {
                return ServerError::InvalidAddress {
                    addr: self.bind_address.clone(),
                    source,
                }
            }
        };

        let listener = match Listener::bind(addr, self.max_connections).await {
            Ok(listener) => listener,
            Err(e) => return e,
        };
        if let Ok(local) = listener.local_addr() {
            self.bound.send_replace(Some(local));
            tracing::info!(address = %local, "HTTP server starting");
        }

        let mut failures = 0u32;
        while *state.borrow_and_update() == ConnectionState::Active {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        failures = 0;
                        self.spawn_connection(stream, peer, permit);
                    }
                    Err(e) if is_transient_accept_error(&e) => {
                        failures = failures.saturating_add(1);
                        let delay = calculate_backoff(failures, ACCEPT_BACKOFF_BASE_MS, ACCEPT_BACKOFF_MAX_MS);
                        tracing::warn!(error = %e, delay = ?delay, "Accept failed, retrying");
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = state.changed() => {}
                        }
                    }
                    Err(e) => return ServerError::Accept(e),
                },
                _ = state.changed() => {}
            }
        }

        drop(listener);
        tracing::info!("HTTP server stopped accepting");
        ServerError::Closed
    }

    fn set_keep_alives_enabled(&self, enabled: bool) {
        self.keep_alive.store(enabled, Ordering::SeqCst);
        tracing::debug!(enabled, "Keep-alive updated");
    }

    async fn shutdown(&self, deadline: Instant) -> Result<(), ServerError> {
        let started = Instant::now();
        self.advance(ConnectionState::Draining);
        tracing::info!(
            active_connections = self.connections.active_count(),
            "Draining connections"
        );

        match tokio::time::timeout_at(deadline, self.connections.wait_idle()).await {
            Ok(()) => {
                tracing::info!("All connections drained");
                Ok(())
            }
            Err(_) => Err(ServerError::ShutdownTimeout(
                deadline.saturating_duration_since(started),
            )),
        }
    }

    /// Drops every connection and aborts every HTTP/2 stream task, so hung
    /// handlers stop on either protocol.
    async fn close(&self) -> Result<(), ServerError> {
        self.advance(ConnectionState::Closed);
        let aborted_streams = self.streams.abort_all();
        tracing::warn!(
            active_connections = self.connections.active_count(),
            aborted_streams,
            "Force closing connections"
        );

        match tokio::time::timeout(CLOSE_GRACE, self.connections.wait_idle()).await {
            Ok(()) => Ok(()),
            Err(_) => Err(ServerError::Close(format!(
                "{} connections still open after {:?}",
                self.connections.active_count(),
                CLOSE_GRACE
            ))),
        }
    }
}
