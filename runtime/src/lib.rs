//! # Orderstream Runtime
//!
//! The working parts of the order service, built on the capability traits in
//! `orderstream-core`.
//!
//! ## Core Components
//!
//! - **Retrying persistence**: [`persistence::RetryingRepository`] wraps a Record
//!   Store with bounded exponential backoff ([`retry`])
//! - **Cache**: [`cache::TtlOrderCache`], a concurrent TTL cache with warm-up
//! - **Ingestion**: [`ingest::IngestionPipeline`], consume → validate → persist,
//!   with a dead-letter path for messages that cannot be stored
//! - **Query**: [`query::OrderQueryService`], cache-aside point lookups
//! - **Metrics**: Prometheus recorder and per-component counters ([`metrics`])
//!
//! ## Example
//!
//! ```ignore
//! use orderstream_runtime::{OrderQueryService, RetryingRepository, TtlOrderCache};
//!
//! let persistence = Arc::new(RetryingRepository::new(store));
//! let cache = Arc::new(TtlOrderCache::builder().ttl(ttl).build());
//! cache.warm_up(&ctx, persistence.as_ref()).await?;
//!
//! let queries = OrderQueryService::new(cache.clone(), persistence.clone());
//! let order = queries.get_order(&ctx, "b563feb7b2b84b6test").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// In-memory TTL cache with warm-up
pub mod cache;

/// Ingestion pipeline with dead-letter handling
pub mod ingest;

/// Prometheus metrics for observability
pub mod metrics;

/// Retrying persistence wrapper
pub mod persistence;

/// Cache-aside query service
pub mod query;

/// Retry logic with exponential backoff
pub mod retry;

pub use cache::TtlOrderCache;
pub use ingest::{IngestError, IngestionPipeline, PipelineConfig, ProcessOutcome, RunSummary};
pub use persistence::RetryingRepository;
pub use query::{OrderQueryService, QueryError};
pub use retry::RetryPolicy;
