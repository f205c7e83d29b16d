//! # Orderstream Testing
//!
//! Test doubles and fixtures for the order service.
//!
//! This crate provides:
//! - [`InMemoryOrderRepository`]: Record Store double with fault injection and call counters
//! - [`InMemorySource`] / [`InMemorySink`]: message transport doubles
//! - [`FixedClock`]: deterministic time
//! - [`fixtures`]: complete, valid Order Records
//!
//! ## Example
//!
//! ```
//! use orderstream_testing::{Fault, InMemoryOrderRepository};
//! use orderstream_testing::fixtures::sample_order;
//!
//! let store = InMemoryOrderRepository::new();
//! store.seed(sample_order("order-1"));
//! store.fail_selects(Fault::ConnectionClosed, 2);
//! assert_eq!(store.len(), 1);
//! ```

use chrono::{DateTime, Utc};
use orderstream_core::environment::Clock;

pub mod fixtures;
pub mod repository_mocks;
pub mod transport_mocks;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use orderstream_testing::mocks::FixedClock;
    /// use orderstream_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
pub use repository_mocks::{Fault, InMemoryOrderRepository};
pub use transport_mocks::{InMemorySink, InMemorySource};
