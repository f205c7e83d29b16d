//! Startup, steady-state and graceful shutdown of the assembled service over
//! in-memory infrastructure.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use chrono::{Duration as ChronoDuration, Utc};
use orderstream_core::cache::OrderCache;
use orderstream_core::message::InboundMessage;
use orderstream_server::{Application, Config};
use orderstream_testing::fixtures::{sample_order, sample_order_created_at};
use orderstream_testing::{Fault, InMemoryOrderRepository, InMemorySink, InMemorySource};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

fn test_config() -> Config {
    let mut config = Config::from_lookup(|_| None);
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.shutdown_timeout = 5;
    config.ingest.attempt_backoff_ms = 10;
    config.ingest.receive_error_backoff_ms = 10;
    config
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn warm_up_loads_recent_orders_before_serving() {
    let store = Arc::new(InMemoryOrderRepository::new());
    store.seed(sample_order_created_at(
        "recent",
        Utc::now() - ChronoDuration::days(1),
    ));
    store.seed(sample_order("ancient"));

    let app = Application::assemble(
        test_config(),
        store.clone(),
        Arc::new(InMemorySource::new()),
        Arc::new(InMemorySink::new("orders-dlq")),
        None,
    )
    .await
    .unwrap();

    let cache = app.cache();
    assert!(cache.get("recent").is_some());
    assert!(cache.get("ancient").is_none());
}

#[tokio::test]
async fn warm_up_failure_does_not_abort_startup() {
    let store = Arc::new(InMemoryOrderRepository::new());
    store.fail_lists(Fault::Database, usize::MAX);

    let app = Application::assemble(
        test_config(),
        store,
        Arc::new(InMemorySource::new()),
        Arc::new(InMemorySink::new("orders-dlq")),
        None,
    )
    .await;

    assert!(app.is_ok());
}

#[tokio::test]
async fn invalid_cors_origin_is_a_startup_error() {
    let mut config = test_config();
    config.server.cors_origin = "bad\norigin".to_string();

    let app = Application::assemble(
        config,
        Arc::new(InMemoryOrderRepository::new()),
        Arc::new(InMemorySource::new()),
        Arc::new(InMemorySink::new("orders-dlq")),
        None,
    )
    .await;

    assert!(app.is_err());
}

#[tokio::test]
async fn ingested_order_is_served_and_shutdown_is_graceful() {
    let store = Arc::new(InMemoryOrderRepository::new());
    let source = Arc::new(InMemorySource::new());
    let dead_letters = Arc::new(InMemorySink::new("orders-dlq"));

    let app = Application::assemble(
        test_config(),
        store.clone(),
        source.clone(),
        dead_letters.clone(),
        None,
    )
    .await
    .unwrap();
    let addr = app.local_addr().unwrap();
    let cache = app.cache();

    let (stop, stopped) = oneshot::channel::<()>();
    let running = tokio::spawn(app.run_until(async move {
        let _ = stopped.await;
    }));

    let payload = sample_order("fresh").to_json().unwrap();
    source.push(InboundMessage::new("orders", payload).at(0, 0));
    source.push(InboundMessage::new("orders", b"not json".to_vec()).at(0, 1));
    wait_until(|| source.acked().len() == 2).await;

    assert!(store.get("fresh").is_some());
    assert!(cache.get("fresh").is_some());
    assert!(dead_letters.sent().is_empty());

    let found = http_get(addr, "/orders/fresh").await;
    assert!(found.starts_with("HTTP/1.1 200"), "{found}");
    assert!(found.contains(r#""orderUID":"fresh""#));

    let missing = http_get(addr, "/orders/unknown").await;
    assert!(missing.starts_with("HTTP/1.1 404"), "{missing}");

    let health = http_get(addr, "/health").await;
    assert!(health.ends_with("OK"), "{health}");

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(10), running)
        .await
        .expect("shutdown exceeded grace period")
        .unwrap()
        .unwrap();

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn lookup_in_flight_at_shutdown_still_completes() {
    let store = Arc::new(InMemoryOrderRepository::new());
    store.seed(sample_order("slow"));

    let app = Application::assemble(
        test_config(),
        store.clone(),
        Arc::new(InMemorySource::new()),
        Arc::new(InMemorySink::new("orders-dlq")),
        None,
    )
    .await
    .unwrap();
    let addr = app.local_addr().unwrap();
    store.set_latency(Duration::from_millis(300));

    let (stop, stopped) = oneshot::channel::<()>();
    let running = tokio::spawn(app.run_until(async move {
        let _ = stopped.await;
    }));

    let request = tokio::spawn(async move { http_get(addr, "/orders/slow").await });
    wait_until(|| store.select_calls() >= 1).await;
    stop.send(()).unwrap();

    let response = request.await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains(r#""orderUID":"slow""#));

    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn stuck_task_does_not_extend_shutdown_past_grace_period() {
    let store = Arc::new(InMemoryOrderRepository::new());
    let source = Arc::new(InMemorySource::new());
    let mut config = test_config();
    config.server.shutdown_timeout = 1;

    let app = Application::assemble(
        config,
        store.clone(),
        source.clone(),
        Arc::new(InMemorySink::new("orders-dlq")),
        None,
    )
    .await
    .unwrap();
    store.set_latency(Duration::from_secs(60));

    let (stop, stopped) = oneshot::channel::<()>();
    let running = tokio::spawn(app.run_until(async move {
        let _ = stopped.await;
    }));

    let payload = sample_order("stuck").to_json().unwrap();
    source.push(InboundMessage::new("orders", payload).at(0, 0));
    wait_until(|| store.insert_calls() >= 1).await;

    let started = std::time::Instant::now();
    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(3), running)
        .await
        .expect("shutdown waited on the stuck consumer past the grace period")
        .unwrap()
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(source.acked().is_empty());
}
