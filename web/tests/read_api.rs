//! End-to-end tests for the Read API router using axum-test.
//!
//! The router is wired to the real query service, cache and retrying wrapper
//! over an in-memory Record Store.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum_test::TestServer;
use orderstream_core::cache::OrderCache;
use orderstream_runtime::metrics::Metrics;
use orderstream_runtime::{OrderQueryService, RetryingRepository, TtlOrderCache};
use orderstream_testing::fixtures::sample_order;
use orderstream_testing::{Fault, InMemoryOrderRepository};
use orderstream_web::{AppState, CORRELATION_ID_HEADER, CorsLayer, router};
use std::sync::Arc;

struct Harness {
    server: TestServer,
    store: Arc<InMemoryOrderRepository>,
    cache: Arc<TtlOrderCache>,
}

fn harness_with(configure: impl FnOnce(AppState) -> AppState) -> Harness {
    let store = Arc::new(InMemoryOrderRepository::new());
    let persistence = Arc::new(RetryingRepository::new(store.clone()));
    let cache = Arc::new(TtlOrderCache::builder().build());
    let queries = Arc::new(OrderQueryService::new(cache.clone(), persistence));
    let state = configure(AppState::new(queries));

    let server = TestServer::new(router(state, CorsLayer::default())).unwrap();
    Harness {
        server,
        store,
        cache,
    }
}

fn harness() -> Harness {
    harness_with(|state| state)
}

#[tokio::test]
async fn stored_order_is_served_as_json_and_cached() {
    let h = harness();
    let record = sample_order("b563feb7b2b84b6test");
    h.store.seed(record.clone());

    let response = h.server.get("/orders/b563feb7b2b84b6test").await;

    response.assert_status_ok();
    assert_eq!(
        response.json::<serde_json::Value>(),
        serde_json::to_value(&record).unwrap()
    );
    assert!(h.cache.get("b563feb7b2b84b6test").is_some());
}

#[tokio::test]
async fn cached_order_is_served_without_touching_the_store() {
    let h = harness();
    let record = sample_order("cached-only");
    h.cache.set("cached-only", Arc::new(record.clone()));

    let response = h.server.get("/orders/cached-only").await;

    response.assert_status_ok();
    assert_eq!(h.store.select_calls(), 0);
}

#[tokio::test]
async fn unknown_order_is_404_with_empty_body() {
    let h = harness();

    let response = h.server.get("/orders/missing").await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert!(response.text().is_empty());
}

#[tokio::test]
async fn store_failure_is_500_with_empty_body() {
    let h = harness();
    h.store.fail_selects(Fault::Database, usize::MAX);

    let response = h.server.get("/orders/any").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().is_empty());
    assert!(h.cache.get("any").is_none());
}

#[tokio::test]
async fn health_returns_ok_text() {
    let h = harness();

    let response = h.server.get("/health").await;

    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn metrics_is_404_without_recorder() {
    let h = harness();

    h.server
        .get("/metrics")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_is_served_when_recorder_attached() {
    let h = harness_with(|state| state.with_metrics(Metrics::detached()));

    let response = h.server.get("/metrics").await;

    response.assert_status_ok();
    assert_eq!(
        response.header("content-type"),
        HeaderValue::from_static("text/plain; version=0.0.4")
    );
}

#[tokio::test]
async fn every_response_carries_cors_headers() {
    let h = harness();

    let ok = h.server.get("/health").await;
    let missing = h.server.get("/orders/missing").await;

    for response in [ok, missing] {
        assert_eq!(
            response.header("access-control-allow-origin"),
            "http://localhost:5000"
        );
        assert_eq!(
            response.header("access-control-allow-methods"),
            "GET, OPTIONS"
        );
        assert_eq!(
            response.header("access-control-allow-headers"),
            "Content-Type"
        );
    }
}

#[tokio::test]
async fn preflight_is_answered_with_200() {
    let h = harness();

    let response = h.server.method(Method::OPTIONS, "/orders/abc").await;

    response.assert_status_ok();
    assert!(response.text().is_empty());
    assert_eq!(h.store.select_calls(), 0);
}

#[tokio::test]
async fn correlation_id_is_echoed() {
    let h = harness();
    let id = "6f1c1e2a-5d6b-4b8e-9a57-2f0e3c4d5b6a";

    let response = h
        .server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-correlation-id"),
            HeaderValue::from_static(id),
        )
        .await;

    assert_eq!(response.header(CORRELATION_ID_HEADER), id);
}
