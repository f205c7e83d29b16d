//! # Orderstream Core
//!
//! Core types and capability traits for the order service.
//!
//! This crate has no I/O of its own. It defines:
//!
//! - **Order Record**: the four-part aggregate (header, delivery, payment, items)
//! - **Validation**: structural and semantic checks run before persistence
//! - **Errors**: the persistence error taxonomy shared by every layer
//! - **Call context**: cancellation + deadline propagation for blocking calls
//! - **Capabilities**: [`repository::OrderRepository`], [`repository::OrderPersistence`],
//!   [`cache::OrderCache`], [`message::MessageSource`], [`message::MessageSink`]
//!
//! ## Data Flow
//!
//! ```text
//! MessageSource ─► decode ─► validate ─► OrderPersistence ─► OrderRepository
//!                                              ▲
//! GET /orders/{id} ─► OrderCache ─(miss)───────┘
//! ```
//!
//! Every capability is a dyn-compatible trait so the production implementations
//! (`orderstream-postgres`, `orderstream-redpanda`) and the in-memory doubles
//! (`orderstream-testing`) are interchangeable behind an `Arc<dyn _>`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::future::Future;
use std::pin::Pin;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod cache;
pub mod context;
pub mod error;
pub mod message;
pub mod order;
pub mod repository;
pub mod validation;

pub use context::{CallContext, ContextError};
pub use error::RepositoryError;
pub use order::{Delivery, Item, OrderHeader, OrderRecord, Payment};

/// Boxed, `Send` future returned by the capability traits.
///
/// The traits use explicit boxed futures instead of `async fn` so they stay
/// usable as trait objects (`Arc<dyn OrderPersistence>`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Environment module - injected dependencies.
///
/// Time is abstracted behind [`Clock`](environment::Clock) so validation of
/// creation timestamps and dead-letter timestamps are deterministic in tests.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use orderstream_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = chrono::Utc::now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
