//! Cache capability.
//!
//! The cache is a process-local `id → record` map shared by every task. It is
//! constructed once at startup and handed to the query service, the ingestion
//! pipeline and the warm-up routine; there is no global instance.

use crate::context::CallContext;
use crate::error::RepositoryError;
use crate::order::OrderRecord;
use crate::repository::OrderPersistence;
use crate::BoxFuture;
use std::sync::Arc;

/// Concurrent order cache with per-entry expiry.
///
/// `get` and `set` never block and need no external locking.
pub trait OrderCache: Send + Sync {
    /// Look up a live entry. Expired and unknown ids are both `None`.
    fn get(&self, id: &str) -> Option<Arc<OrderRecord>>;

    /// Store or replace the entry for `id`; last write wins.
    fn set(&self, id: &str, record: Arc<OrderRecord>);

    /// Pre-load recently created orders from the store.
    ///
    /// Returns the number of entries loaded.
    ///
    /// # Errors
    ///
    /// Returns the first listing or fetch error. Entries already loaded stay live.
    fn warm_up<'a>(
        &'a self,
        ctx: &'a CallContext,
        persistence: &'a dyn OrderPersistence,
    ) -> BoxFuture<'a, Result<usize, RepositoryError>>;
}
