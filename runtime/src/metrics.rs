//! Prometheus metrics for the order service.
//!
//! Components record through the `metrics` facade using the small recorder
//! structs below:
//! - Cache hits, misses, writes and size
//! - Retrying persistence wrapper attempts
//! - Ingestion pipeline outcomes
//! - Query service lookups
//!
//! Recording is a no-op until a recorder is installed, so tests that never
//! call [`Metrics::install`] are unaffected.
//!
//! # Example
//!
//! ```rust,no_run
//! use orderstream_runtime::metrics::Metrics;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = Metrics::install()?;
//!
//! // Served by the Read API at GET /metrics
//! let text = metrics.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Handle to the installed Prometheus recorder.
#[derive(Clone)]
pub struct Metrics {
    handle: PrometheusHandle,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Describe all metrics and install the Prometheus recorder globally.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if a recorder is already installed.
    pub fn install() -> Result<Self, MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        let handle = builder
            .install_recorder()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        tracing::info!("Metrics recorder installed");
        Ok(Self { handle })
    }

    /// Build a handle whose recorder is not installed globally.
    ///
    /// Nothing recorded through the `metrics` facade reaches it, so it renders
    /// an empty exposition. Useful where the process-wide recorder is owned
    /// elsewhere (tests, embedded routers).
    #[must_use]
    pub fn detached() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        Self {
            handle: recorder.handle(),
        }
    }

    /// Render current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Cache
    describe_counter!("order_cache_hits_total", "Cache lookups that found a live entry");
    describe_counter!("order_cache_misses_total", "Cache lookups that found nothing or an expired entry");
    describe_counter!("order_cache_sets_total", "Entries written to the cache");
    describe_counter!("order_cache_evictions_total", "Expired entries removed from the cache");
    describe_gauge!("order_cache_entries", "Entries currently held by the cache");

    // Retry
    describe_counter!("store_retry_attempts_total", "Retries scheduled after a transient store failure");
    describe_counter!("store_retry_successes_total", "Operations that succeeded after at least one retry");
    describe_counter!("store_retry_exhausted_total", "Operations that ran out of retry budget");

    // Ingestion
    describe_counter!("ingest_messages_received_total", "Messages read from the order topic");
    describe_counter!("ingest_messages_persisted_total", "Messages stored successfully");
    describe_counter!("ingest_messages_invalid_total", "Messages dropped for decode or validation failures");
    describe_counter!("ingest_messages_dead_lettered_total", "Messages forwarded to the dead-letter topic");
    describe_counter!("ingest_dead_letter_failures_total", "Dead-letter writes that failed");
    describe_counter!("ingest_receive_errors_total", "Transport errors while receiving");

    // Query
    describe_counter!("order_queries_total", "Order lookups by outcome");
    describe_histogram!("order_query_duration_seconds", "Time taken to serve an order lookup");
}

/// Cache metrics recorder.
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record a cache hit.
    pub fn record_hit() {
        counter!("order_cache_hits_total").increment(1);
    }

    /// Record a cache miss.
    pub fn record_miss() {
        counter!("order_cache_misses_total").increment(1);
    }

    /// Record a cache write.
    pub fn record_set() {
        counter!("order_cache_sets_total").increment(1);
    }

    /// Record expired entries removed and the remaining size.
    #[allow(clippy::cast_precision_loss)] // Entry counts stay far below 2^52
    pub fn record_sweep(evicted: usize, remaining: usize) {
        counter!("order_cache_evictions_total").increment(evicted as u64);
        gauge!("order_cache_entries").set(remaining as f64);
    }
}

/// Retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a retry attempt.
    pub fn record_attempt() {
        counter!("store_retry_attempts_total").increment(1);
    }

    /// Record a successful retry.
    pub fn record_success() {
        counter!("store_retry_successes_total").increment(1);
    }

    /// Record exhausted retries.
    pub fn record_exhausted() {
        counter!("store_retry_exhausted_total").increment(1);
    }
}

/// Ingestion pipeline metrics recorder.
pub struct IngestMetrics;

impl IngestMetrics {
    /// Record a received message.
    pub fn record_received() {
        counter!("ingest_messages_received_total").increment(1);
    }

    /// Record a stored message.
    pub fn record_persisted() {
        counter!("ingest_messages_persisted_total").increment(1);
    }

    /// Record a message dropped as invalid.
    pub fn record_invalid() {
        counter!("ingest_messages_invalid_total").increment(1);
    }

    /// Record a dead-lettered message.
    pub fn record_dead_lettered() {
        counter!("ingest_messages_dead_lettered_total").increment(1);
    }

    /// Record a failed dead-letter write.
    pub fn record_dead_letter_failure() {
        counter!("ingest_dead_letter_failures_total").increment(1);
    }

    /// Record a transport receive error.
    pub fn record_receive_error() {
        counter!("ingest_receive_errors_total").increment(1);
    }
}

/// Query service metrics recorder.
pub struct QueryMetrics;

impl QueryMetrics {
    /// Record one lookup with its outcome (`hit`, `store`, `not_found`, `error`).
    pub fn record(outcome: &'static str, duration: Duration) {
        counter!("order_queries_total", "outcome" => outcome).increment(1);
        histogram!("order_query_duration_seconds").record(duration.as_secs_f64());
    }
}
