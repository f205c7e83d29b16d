//! Persistence error taxonomy.
//!
//! | Class                     | Variant(s)                                 | Retried? |
//! |---------------------------|--------------------------------------------|----------|
//! | Transient infrastructure  | `ConnectionClosed`, `TransactionClosed`    | yes      |
//! | Not found                 | `NotFound`                                 | no       |
//! | Terminal                  | `Database`                                 | no       |
//! | Exhausted retry           | `RetriesExhausted`                         | no       |
//! | Cancellation              | `Context`                                  | no       |
//!
//! Validation and decode failures never reach the store and live in
//! [`validation`](crate::validation).

use crate::context::ContextError;
use thiserror::Error;

/// Errors from the Record Store and the retrying persistence wrapper.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No order with this id.
    #[error("order not found: {0}")]
    NotFound(String),

    /// The connection was closed underneath the operation.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The transaction had already been committed or rolled back.
    #[error("transaction already closed: {0}")]
    TransactionClosed(String),

    /// Any other store failure (constraint violation, bad row, SQL error).
    #[error("database error: {0}")]
    Database(String),

    /// The retry budget ran out while the failure stayed transient.
    #[error("{operation} failed, retry budget exhausted after {attempts} attempts")]
    RetriesExhausted {
        /// Which operation was retried (`insert`, `select`).
        operation: &'static str,
        /// How many attempts were made.
        attempts: u32,
    },

    /// The caller's context ended while the operation was waiting.
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl RepositoryError {
    /// Whether the retrying wrapper may try again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionClosed(_) | Self::TransactionClosed(_))
    }

    /// Whether the error means the row is absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the error came from the caller's context.
    #[must_use]
    pub const fn is_context(&self) -> bool {
        matches!(self, Self::Context(_))
    }

    /// Whether the retry budget itself ran out.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }
}
