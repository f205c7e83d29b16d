//! In-memory TTL cache for Order Records.
//!
//! Entries live in a sharded [`DashMap`] and carry their own `expires_at`.
//! A read treats `now >= expires_at` as a miss and removes the stale entry;
//! a single background sweeper (see [`TtlOrderCache::spawn_sweeper`]) removes
//! expired entries nobody reads. Expiry is always judged against the live
//! entry, so a later `set` is never erased by an earlier entry's deadline.
//!
//! # Example
//!
//! ```rust
//! use orderstream_runtime::cache::TtlOrderCache;
//! use orderstream_core::cache::OrderCache;
//! use orderstream_core::OrderRecord;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let cache = TtlOrderCache::builder().ttl(Duration::from_secs(60)).build();
//! cache.set("order-1", Arc::new(OrderRecord::default()));
//! assert!(cache.get("order-1").is_some());
//! assert!(cache.get("order-2").is_none());
//! ```

use crate::metrics::CacheMetrics;
use dashmap::DashMap;
use orderstream_core::BoxFuture;
use orderstream_core::cache::OrderCache;
use orderstream_core::environment::{Clock, SystemClock};
use orderstream_core::repository::OrderPersistence;
use orderstream_core::{CallContext, OrderRecord, RepositoryError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(48 * 60 * 60);

/// Default warm-up window: orders created in the last 7 days.
pub const DEFAULT_WARM_UP_WINDOW_DAYS: u32 = 7;

/// Deadline for fetching a single record during warm-up.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(4);

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct Entry {
    record: Arc<OrderRecord>,
    expires_at: Instant,
}

/// Concurrent cache with per-entry expiry and warm-up from the Record Store.
pub struct TtlOrderCache {
    entries: DashMap<String, Entry>,
    ttl: Duration,
    warm_up_window: chrono::Duration,
    fetch_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TtlOrderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlOrderCache")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .field("warm_up_window", &self.warm_up_window)
            .finish_non_exhaustive()
    }
}

impl Default for TtlOrderCache {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TtlOrderCache {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> TtlOrderCacheBuilder {
        TtlOrderCacheBuilder::default()
    }

    /// The configured entry lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of entries currently held, expired ones not yet swept included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        let remaining = self.entries.len();
        let evicted = before.saturating_sub(remaining);

        CacheMetrics::record_sweep(evicted, remaining);
        if evicted > 0 {
            tracing::debug!(evicted, remaining, "Swept expired cache entries");
        }
        evicted
    }

    /// Run [`sweep`](Self::sweep) every `interval` until `shutdown` fires.
    ///
    /// Intervals below one millisecond are raised to one millisecond.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_SWEEP_INTERVAL));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        tracing::info!("Cache sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        cache.sweep();
                    }
                }
            }
        })
    }
}

impl OrderCache for TtlOrderCache {
    fn get(&self, id: &str) -> Option<Arc<OrderRecord>> {
        let now = Instant::now();
        let expired = match self.entries.get(id) {
            Some(entry) if now < entry.expires_at => {
                CacheMetrics::record_hit();
                return Some(Arc::clone(&entry.record));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            // Re-check under the write lock: a concurrent set may have refreshed it.
            self.entries.remove_if(id, |_, entry| now >= entry.expires_at);
        }
        CacheMetrics::record_miss();
        None
    }

    fn set(&self, id: &str, record: Arc<OrderRecord>) {
        let expires_at = Instant::now() + self.ttl;
        self.entries
            .insert(id.to_string(), Entry { record, expires_at });
        CacheMetrics::record_set();
    }

    fn warm_up<'a>(
        &'a self,
        ctx: &'a CallContext,
        persistence: &'a dyn OrderPersistence,
    ) -> BoxFuture<'a, Result<usize, RepositoryError>> {
        Box::pin(async move {
            let since = self.clock.now() - self.warm_up_window;
            let ids = persistence
                .list_created_since(ctx, since)
                .await
                .inspect_err(|e| tracing::error!(error = %e, "Cache warm-up listing failed"))?;

            tracing::info!(candidates = ids.len(), since = %since, "Warming up order cache");

            let mut loaded = 0;
            for id in &ids {
                let fetch_ctx = ctx.with_timeout(self.fetch_timeout);
                let record = persistence
                    .select_with_retry(&fetch_ctx, id)
                    .await
                    .inspect_err(|e| {
                        tracing::error!(order_id = %id, loaded, error = %e, "Cache warm-up fetch failed");
                    })?;
                self.set(id, Arc::new(record));
                loaded += 1;
            }

            tracing::info!(loaded, "Cache warm-up complete");
            Ok(loaded)
        })
    }
}

/// Builder for [`TtlOrderCache`].
pub struct TtlOrderCacheBuilder {
    ttl: Duration,
    warm_up_window_days: u32,
    fetch_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl Default for TtlOrderCacheBuilder {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            warm_up_window_days: DEFAULT_WARM_UP_WINDOW_DAYS,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            clock: Arc::new(SystemClock),
        }
    }
}

impl TtlOrderCacheBuilder {
    /// Set the entry lifetime.
    #[must_use]
    pub const fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set how many days back warm-up looks.
    #[must_use]
    pub const fn warm_up_window_days(mut self, days: u32) -> Self {
        self.warm_up_window_days = days;
        self
    }

    /// Set the per-record fetch deadline used by warm-up.
    #[must_use]
    pub const fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the clock used to compute the warm-up window.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the cache.
    #[must_use]
    pub fn build(self) -> TtlOrderCache {
        TtlOrderCache {
            entries: DashMap::new(),
            ttl: self.ttl,
            warm_up_window: chrono::Duration::days(i64::from(self.warm_up_window_days)),
            fetch_timeout: self.fetch_timeout,
            clock: self.clock,
        }
    }
}
