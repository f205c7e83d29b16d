//! Application state for Axum handlers.

use orderstream_core::CallContext;
use orderstream_runtime::OrderQueryService;
use orderstream_runtime::metrics::Metrics;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cheap to clone: every field is a handle.
#[derive(Clone, Debug)]
pub struct AppState {
    queries: Arc<OrderQueryService>,
    metrics: Option<Metrics>,
}

impl AppState {
    /// Create state over the query service.
    #[must_use]
    pub const fn new(queries: Arc<OrderQueryService>) -> Self {
        Self {
            queries,
            metrics: None,
        }
    }

    /// Serve `GET /metrics` from this recorder.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The query service.
    #[must_use]
    pub fn queries(&self) -> &OrderQueryService {
        &self.queries
    }

    /// The metrics recorder, if one is attached.
    #[must_use]
    pub const fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    /// A call context for one request.
    ///
    /// Not tied to process shutdown: a lookup already in flight when the
    /// signal arrives runs to completion (bounded by the query service's
    /// deadline and the server's grace period).
    #[must_use]
    pub fn request_context(&self) -> CallContext {
        CallContext::background()
    }
}
