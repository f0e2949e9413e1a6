//! Shared utilities for the lifecycle tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use graceful_server::{Server, ServerError};

/// An operation the runner performed on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Serve,
    KeepAlive(bool),
    Shutdown,
    Close,
}

/// How `serve` ends.
pub enum ServeScript {
    /// Fail with a bind error after the delay, without any shutdown.
    FailAfter(Duration),
    /// Run until shutdown or close, then report `Closed` after the delay.
    UntilStopped { closed_after: Duration },
    Panic,
}

/// How `shutdown` behaves.
pub enum DrainScript {
    /// Connections drain after the delay (the deadline still applies).
    DrainsAfter(Duration),
    /// Fails at once with a non-timeout error.
    Fails,
}

/// Scripted [`Server`] recording every call with its time.
pub struct MockServer {
    serve: ServeScript,
    drain: DrainScript,
    close_fails: bool,
    stopped: watch::Sender<bool>,
    calls: Mutex<Vec<(Call, Instant)>>,
    epoch: Instant,
}

impl MockServer {
    pub fn new(serve: ServeScript, drain: DrainScript) -> Self {
        let (stopped, _) = watch::channel(false);
        Self {
            serve,
            drain,
            close_fails: false,
            stopped,
            calls: Mutex::new(Vec::new()),
            epoch: Instant::now(),
        }
    }

    pub fn close_fails(mut self) -> Self {
        self.close_fails = true;
        self
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push((call, Instant::now()));
    }

    /// Calls in order, `Serve` included.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(c, _)| *c).collect()
    }

    /// Calls other than `Serve`, in order.
    pub fn shutdown_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| *c != Call::Serve)
            .collect()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().into_iter().filter(|c| *c == call).count()
    }

    /// Time since construction at which `call` was first made.
    pub fn time_of(&self, call: Call) -> Option<Duration> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(c, _)| *c == call)
            .map(|(_, at)| *at - self.epoch)
    }
}

impl Server for MockServer {
    async fn serve(&self) -> ServerError {
        self.record(Call::Serve);
        match self.serve {
            ServeScript::FailAfter(delay) => {
                tokio::time::sleep(delay).await;
                ServerError::Bind {
                    addr: "127.0.0.1:8080".parse().unwrap(),
                    source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
                }
            }
            ServeScript::UntilStopped { closed_after } => {
                let mut stopped = self.stopped.subscribe();
                let _ = stopped.wait_for(|s| *s).await;
                tokio::time::sleep(closed_after).await;
                ServerError::Closed
            }
            ServeScript::Panic => panic!("serve blew up"),
        }
    }

    fn set_keep_alives_enabled(&self, enabled: bool) {
        self.record(Call::KeepAlive(enabled));
    }

    async fn shutdown(&self, deadline: Instant) -> Result<(), ServerError> {
        self.record(Call::Shutdown);
        let started = Instant::now();
        match self.drain {
            DrainScript::DrainsAfter(delay) => {
                match tokio::time::timeout_at(deadline, tokio::time::sleep(delay)).await {
                    Ok(()) => {
                        self.stopped.send_replace(true);
                        Ok(())
                    }
                    Err(_) => Err(ServerError::ShutdownTimeout(deadline - started)),
                }
            }
            DrainScript::Fails => Err(ServerError::Accept(std::io::Error::other(
                "listener close failed",
            ))),
        }
    }

    async fn close(&self) -> Result<(), ServerError> {
        self.record(Call::Close);
        self.stopped.send_replace(true);
        if self.close_fails {
            Err(ServerError::Close("3 connections still open".into()))
        } else {
            Ok(())
        }
    }
}
