//! End-to-end shutdown tests against a real HTTP server on loopback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::net::TcpStream;

use graceful_server::config::ListenerConfig;
use graceful_server::net::ConnectionState;
use graceful_server::{GracefulRunner, HttpServer, ServerError, Shutdown};

fn app() -> Router {
    Router::new()
        .route("/", get(|| async { "hello" }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                "done"
            }),
        )
        .route("/hang", get(std::future::pending::<()>))
}

fn loopback() -> ListenerConfig {
    ListenerConfig {
        bind_address: "127.0.0.1:0".into(),
        max_connections: 64,
    }
}

struct Running {
    server: Arc<HttpServer>,
    shutdown: Shutdown,
    outcome: tokio::task::JoinHandle<ServerError>,
    base_url: String,
}

async fn start(timeout: Duration) -> Running {
    let server = Arc::new(HttpServer::new(&loopback(), app()));
    let shutdown = Shutdown::new();
    let runner = GracefulRunner::with_shared(Arc::clone(&server), timeout);

    let outcome = tokio::spawn(runner.run_until(shutdown.signal()));
    let addr = tokio::time::timeout(Duration::from_secs(5), server.listening())
        .await
        .expect("server should bind");

    Running {
        server,
        shutdown,
        outcome,
        base_url: format!("http://{}", addr),
    }
}

#[tokio::test]
async fn in_flight_request_completes_during_shutdown() {
    let running = start(Duration::from_secs(5)).await;
    let addr = running.server.local_addr().unwrap();

    let url = format!("{}/slow", running.base_url);
    let request = tokio::spawn(async move { reqwest::get(url).await?.text().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(running.server.active_connections(), 1);
    running.shutdown.trigger();

    let body = request.await.unwrap().expect("in-flight request should finish");
    assert_eq!(body, "done");

    let outcome = running.outcome.await.unwrap();
    assert!(outcome.is_closed(), "got {outcome:?}");
    assert!(!running.server.keep_alives_enabled());
    assert_eq!(running.server.active_connections(), 0);

    // Listener is gone.
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn idle_keep_alive_connection_does_not_hold_shutdown() {
    let running = start(Duration::from_secs(5)).await;

    let client = reqwest::Client::new();
    let body = client
        .get(format!("{}/", running.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "hello");

    running.shutdown.trigger();
    let outcome = tokio::time::timeout(Duration::from_secs(2), running.outcome)
        .await
        .expect("idle connections should not delay shutdown")
        .unwrap();
    assert!(outcome.is_closed());
}

#[tokio::test]
async fn hung_request_times_out_and_is_force_closed() {
    let running = start(Duration::from_millis(200)).await;

    let url = format!("{}/hang", running.base_url);
    let request = tokio::spawn(async move { reqwest::get(url).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    running.shutdown.trigger();

    let outcome = running.outcome.await.unwrap();
    assert!(
        matches!(outcome, ServerError::ShutdownTimeout(_)),
        "got {outcome:?}"
    );
    assert_eq!(running.server.state(), ConnectionState::Closed);
    assert_eq!(running.server.active_connections(), 0);

    let response = tokio::time::timeout(Duration::from_secs(2), request)
        .await
        .expect("client should see the connection drop")
        .unwrap();
    assert!(response.is_err());
}

#[tokio::test]
async fn occupied_port_is_the_run_result() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let config = ListenerConfig {
        bind_address: taken.local_addr().unwrap().to_string(),
        ..loopback()
    };

    let runner = GracefulRunner::new(HttpServer::new(&config, app()), Duration::from_secs(1));
    let outcome = runner.run_until(std::future::pending()).await;

    assert!(matches!(outcome, ServerError::Bind { .. }), "got {outcome:?}");
}

/// Counts live handler futures; decremented when a handler is dropped.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn force_close_aborts_hung_http2_handlers() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&in_flight);
    let app = Router::new().route(
        "/hang",
        get(move || {
            let guard = InFlight::enter(&counter);
            async move {
                let _guard = guard;
                std::future::pending::<()>().await
            }
        }),
    );

    let server = Arc::new(HttpServer::new(&loopback(), app));
    let shutdown = Shutdown::new();
    let runner = GracefulRunner::with_shared(Arc::clone(&server), Duration::from_millis(200));
    let outcome = tokio::spawn(runner.run_until(shutdown.signal()));
    let addr = tokio::time::timeout(Duration::from_secs(5), server.listening())
        .await
        .expect("server should bind");

    let client = reqwest::Client::builder()
        .http2_prior_knowledge()
        .build()
        .unwrap();
    let url = format!("http://{}/hang", addr);
    let request = tokio::spawn(async move { client.get(url).send().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(in_flight.load(Ordering::SeqCst), 1);
    shutdown.trigger();

    let outcome = outcome.await.unwrap();
    assert!(
        matches!(outcome, ServerError::ShutdownTimeout(_)),
        "got {outcome:?}"
    );

    let released = tokio::time::timeout(Duration::from_secs(2), async {
        while in_flight.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "hung handler should be aborted by close");

    let response = tokio::time::timeout(Duration::from_secs(2), request)
        .await
        .expect("client should see the connection drop")
        .unwrap();
    assert!(response.is_err());
}
