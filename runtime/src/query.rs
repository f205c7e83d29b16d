//! Cache-aside point lookups.
//!
//! ```text
//! get_order(id) ─► cache hit? ──yes──► return
//!                      │ no
//!                      ▼
//!        select_with_retry (4s deadline)
//!                      │
//!        ok ─► cache.set ─► return
//!        not found ─► QueryError::NotFound   (cache untouched)
//!        other ─────► QueryError::Internal   (cache untouched)
//! ```

use crate::metrics::QueryMetrics;
use orderstream_core::cache::OrderCache;
use orderstream_core::repository::OrderPersistence;
use orderstream_core::{CallContext, OrderRecord, RepositoryError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default deadline for the store fallback.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(4);

/// Why a lookup produced no record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// No order with this id exists.
    #[error("order not found: {0}")]
    NotFound(String),

    /// The store could not answer.
    #[error("order lookup failed: {0}")]
    Internal(#[source] RepositoryError),
}

/// Serves order lookups from the cache, falling back to the store.
#[derive(Clone)]
pub struct OrderQueryService {
    cache: Arc<dyn OrderCache>,
    persistence: Arc<dyn OrderPersistence>,
    lookup_timeout: Duration,
}

impl std::fmt::Debug for OrderQueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderQueryService")
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}

impl OrderQueryService {
    /// Create a service over a shared cache and persistence wrapper.
    #[must_use]
    pub fn new(cache: Arc<dyn OrderCache>, persistence: Arc<dyn OrderPersistence>) -> Self {
        Self {
            cache,
            persistence,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Override the store fallback deadline.
    #[must_use]
    pub const fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Look up an order by id.
    ///
    /// # Errors
    ///
    /// - [`QueryError::NotFound`] if the store has no such order
    /// - [`QueryError::Internal`] for any other failure, including the deadline
    pub async fn get_order(
        &self,
        ctx: &CallContext,
        id: &str,
    ) -> Result<Arc<OrderRecord>, QueryError> {
        let started = Instant::now();

        if let Some(record) = self.cache.get(id) {
            tracing::debug!(order_id = %id, "Order served from cache");
            QueryMetrics::record("hit", started.elapsed());
            return Ok(record);
        }

        let lookup_ctx = ctx.with_timeout(self.lookup_timeout);
        match self.persistence.select_with_retry(&lookup_ctx, id).await {
            Ok(record) => {
                let record = Arc::new(record);
                self.cache.set(id, Arc::clone(&record));
                tracing::debug!(order_id = %id, "Order loaded from store and cached");
                QueryMetrics::record("store", started.elapsed());
                Ok(record)
            }
            Err(RepositoryError::NotFound(_)) => {
                tracing::debug!(order_id = %id, "Order not found");
                QueryMetrics::record("not_found", started.elapsed());
                Err(QueryError::NotFound(id.to_string()))
            }
            Err(err) => {
                tracing::error!(order_id = %id, error = %err, "Order lookup failed");
                QueryMetrics::record("error", started.elapsed());
                Err(QueryError::Internal(err))
            }
        }
    }
}
