//! Axum Read API for the order service.
//!
//! This crate is the HTTP shell around [`OrderQueryService`]: it parses the
//! request, asks the query service for the order and maps the outcome to a
//! status code. It holds no business logic of its own.
//!
//! # Routes
//!
//! | Method | Path           | Response                                         |
//! |--------|----------------|--------------------------------------------------|
//! | GET    | `/orders/{id}` | 200 + Order Record JSON, 404 or 500 (empty body) |
//! | GET    | `/health`      | 200 `OK`                                         |
//! | GET    | `/metrics`     | Prometheus text, 404 if no recorder is attached  |
//! | OPTIONS| any            | 200 (CORS preflight)                             |
//!
//! # Request Flow
//!
//! 1. **CORS** headers are attached to every response; preflight ends here
//! 2. **Correlation ID** is propagated or generated and a tracing span opened
//! 3. **Handler** calls the query service with a 4s lookup deadline
//! 4. **Error mapping** turns [`QueryError`](orderstream_runtime::QueryError)
//!    into 404 / 500
//!
//! # Example
//!
//! ```ignore
//! use orderstream_web::{AppState, CorsLayer, router};
//!
//! let state = AppState::new(queries);
//! let app = router(state, CorsLayer::new("http://localhost:5000")?);
//! axum::serve(listener, app).await?;
//! ```
//!
//! [`OrderQueryService`]: orderstream_runtime::OrderQueryService

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::CorrelationId;
pub use middleware::{CORRELATION_ID_HEADER, CorsLayer, correlation_id_layer};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the Read API router.
///
/// Layers, outermost first: HTTP trace, CORS, correlation ID. Preflight
/// requests are answered by `cors` before the correlation layer or any
/// handler runs.
pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render_metrics))
        .with_state(state)
        .layer(correlation_id_layer())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
