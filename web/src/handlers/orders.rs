//! Order lookup endpoint.

use crate::extractors::CorrelationId;
use crate::{AppState, WebResult};
use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};

/// Fetch one Order Record.
///
/// # Endpoint
///
/// ```text
/// GET /orders/{id}
/// ```
///
/// # Status Codes
///
/// - 200 OK: the Order Record as JSON
/// - 404 Not Found: no such order (empty body)
/// - 500 Internal Server Error: the store could not answer in time (empty body)
///
/// # Errors
///
/// Returns [`AppError`](crate::AppError) converted from the query service's
/// `QueryError`.
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CorrelationId(correlation_id): CorrelationId,
) -> WebResult<Response> {
    let ctx = state.request_context();
    let order = state.queries().get_order(&ctx, &id).await?;

    tracing::debug!(
        correlation_id = %correlation_id,
        order_uid = %id,
        "Order served"
    );

    Ok(Json(order.as_ref()).into_response())
}
