//! Persistence capabilities.
//!
//! Two layers, each a stable trait so test doubles substitute cleanly:
//!
//! - [`OrderRepository`]: the Record Store itself. One call is one attempt.
//! - [`OrderPersistence`]: the Record Store as consumers see it, with the
//!   bounded-retry variants `select_with_retry` / `insert_with_retry`.
//!
//! # Implementations
//!
//! - `PostgresOrderRepository` (in `orderstream-postgres`): production store
//! - `InMemoryOrderRepository` (in `orderstream-testing`): fault-injecting double
//! - `RetryingRepository` (in `orderstream-runtime`): wraps any `OrderRepository`
//!   into an `OrderPersistence`

use crate::context::CallContext;
use crate::error::RepositoryError;
use crate::order::OrderRecord;
use crate::BoxFuture;
use chrono::{DateTime, Utc};

/// The Record Store.
///
/// Writes are transactional: an `insert` either commits all four parts of the
/// record or none of them.
pub trait OrderRepository: Send + Sync {
    /// Load the full record for `id`.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::NotFound`] if no order row exists
    /// - [`RepositoryError::ConnectionClosed`] / [`RepositoryError::TransactionClosed`]
    ///   on transient infrastructure failures
    /// - [`RepositoryError::Database`] for everything else
    fn select<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<OrderRecord, RepositoryError>>;

    /// Persist a full record in one transaction.
    ///
    /// # Errors
    ///
    /// Same classification as [`select`](Self::select); a duplicate id is a
    /// [`RepositoryError::Database`] error.
    fn insert<'a>(&'a self, record: &'a OrderRecord)
    -> BoxFuture<'a, Result<(), RepositoryError>>;

    /// Ids of all orders created at or after `since`.
    ///
    /// # Errors
    ///
    /// Same classification as [`select`](Self::select).
    fn list_created_since(
        &self,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<String>, RepositoryError>>;
}

/// Record Store access with bounded retry.
pub trait OrderPersistence: Send + Sync {
    /// Single-attempt read.
    ///
    /// # Errors
    ///
    /// See [`OrderRepository::select`].
    fn select<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<OrderRecord, RepositoryError>>;

    /// Read with bounded retry on transient failures.
    ///
    /// # Errors
    ///
    /// - Non-retryable store errors are returned on the attempt that produced them
    /// - [`RepositoryError::Context`] if `ctx` ends while waiting between attempts
    /// - [`RepositoryError::RetriesExhausted`] when the budget runs out
    fn select_with_retry<'a>(
        &'a self,
        ctx: &'a CallContext,
        id: &'a str,
    ) -> BoxFuture<'a, Result<OrderRecord, RepositoryError>>;

    /// Single-attempt write.
    ///
    /// # Errors
    ///
    /// See [`OrderRepository::insert`].
    fn insert<'a>(&'a self, record: &'a OrderRecord)
    -> BoxFuture<'a, Result<(), RepositoryError>>;

    /// Write with bounded retry on transient failures.
    ///
    /// # Errors
    ///
    /// Same as [`select_with_retry`](Self::select_with_retry).
    fn insert_with_retry<'a>(
        &'a self,
        ctx: &'a CallContext,
        record: &'a OrderRecord,
    ) -> BoxFuture<'a, Result<(), RepositoryError>>;

    /// Ids of all orders created at or after `since`.
    ///
    /// # Errors
    ///
    /// Store errors, or [`RepositoryError::Context`] if `ctx` ends first.
    fn list_created_since<'a>(
        &'a self,
        ctx: &'a CallContext,
        since: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<Vec<String>, RepositoryError>>;
}
