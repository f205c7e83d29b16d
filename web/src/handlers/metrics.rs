//! Prometheus exposition endpoint.

use crate::state::AppState;
use axum::{
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};

/// Content type of the Prometheus text exposition format.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Render the attached metrics recorder.
///
/// # Endpoint
///
/// ```text
/// GET /metrics
/// ```
///
/// Returns 404 when the state carries no recorder.
#[allow(clippy::unused_async)]
pub async fn render_metrics(State(state): State<AppState>) -> Response {
    match state.metrics() {
        Some(metrics) => (
            StatusCode::OK,
            [(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
            metrics.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
