//! In-memory Record Store for fast, deterministic tests.
//!
//! Failures are scripted per operation with [`Fault`]s so retry and
//! dead-letter paths can be exercised without a database.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use orderstream_core::BoxFuture;
use orderstream_core::repository::OrderRepository;
use orderstream_core::{DateTime, OrderRecord, RepositoryError, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A scripted store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Transient: connection dropped.
    ConnectionClosed,
    /// Transient: transaction already finished.
    TransactionClosed,
    /// Terminal: any other database error.
    Database,
}

impl Fault {
    fn into_error(self, operation: &str) -> RepositoryError {
        match self {
            Self::ConnectionClosed => {
                RepositoryError::ConnectionClosed(format!("{operation}: connection reset by peer"))
            }
            Self::TransactionClosed => {
                RepositoryError::TransactionClosed(format!("{operation}: transaction already closed"))
            }
            Self::Database => RepositoryError::Database(format!("{operation}: injected failure")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FaultPlan {
    fault: Fault,
    skip: usize,
    remaining: usize,
}

#[derive(Debug, Default)]
struct FaultSlot(Mutex<Option<FaultPlan>>);

impl FaultSlot {
    fn arm(&self, skip: usize, fault: Fault, times: usize) {
        *self.0.lock().unwrap() = Some(FaultPlan {
            fault,
            skip,
            remaining: times,
        });
    }

    fn next(&self) -> Option<Fault> {
        let mut slot = self.0.lock().unwrap();
        let plan = slot.as_mut()?;
        if plan.skip > 0 {
            plan.skip -= 1;
            return None;
        }
        if plan.remaining == 0 {
            *slot = None;
            return None;
        }
        if plan.remaining != usize::MAX {
            plan.remaining -= 1;
        }
        Some(plan.fault)
    }
}

/// In-memory Record Store with fault injection and call counters.
///
/// # Example
///
/// ```
/// use orderstream_testing::{Fault, InMemoryOrderRepository};
/// use orderstream_testing::fixtures::sample_order;
/// use orderstream_core::repository::OrderRepository;
///
/// # async fn example() {
/// let store = InMemoryOrderRepository::new();
/// store.fail_inserts(Fault::ConnectionClosed, 1);
///
/// let record = sample_order("order-1");
/// assert!(store.insert(&record).await.is_err());
/// assert!(store.insert(&record).await.is_ok());
/// assert_eq!(store.insert_calls(), 2);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    orders: Mutex<HashMap<String, OrderRecord>>,
    select_faults: FaultSlot,
    insert_faults: FaultSlot,
    list_faults: FaultSlot,
    select_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    list_calls: AtomicUsize,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryOrderRepository {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record` directly, bypassing faults and counters.
    pub fn seed(&self, record: OrderRecord) {
        self.orders
            .lock()
            .unwrap()
            .insert(record.id().to_string(), record);
    }

    /// Read a stored record directly.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<OrderRecord> {
        self.orders.lock().unwrap().get(id).cloned()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.lock().unwrap().is_empty()
    }

    /// Fail the next `times` selects with `fault` (`usize::MAX` = forever).
    pub fn fail_selects(&self, fault: Fault, times: usize) {
        self.select_faults.arm(0, fault, times);
    }

    /// Let `skip` selects through, then fail the next `times` with `fault`.
    pub fn fail_selects_after(&self, skip: usize, fault: Fault, times: usize) {
        self.select_faults.arm(skip, fault, times);
    }

    /// Fail the next `times` inserts with `fault` (`usize::MAX` = forever).
    pub fn fail_inserts(&self, fault: Fault, times: usize) {
        self.insert_faults.arm(0, fault, times);
    }

    /// Fail the next `times` listings with `fault`.
    pub fn fail_lists(&self, fault: Fault, times: usize) {
        self.list_faults.arm(0, fault, times);
    }

    /// Delay every select and insert by `latency` (tokio time).
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Number of `select` calls so far.
    #[must_use]
    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    /// Number of `insert` calls so far.
    #[must_use]
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    /// Number of `list_created_since` calls so far.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl OrderRepository for InMemoryOrderRepository {
    fn select<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<OrderRecord, RepositoryError>> {
        Box::pin(async move {
            self.select_calls.fetch_add(1, Ordering::SeqCst);
            self.simulate_latency().await;
            if let Some(fault) = self.select_faults.next() {
                return Err(fault.into_error("select"));
            }
            self.get(id)
                .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
        })
    }

    fn insert<'a>(
        &'a self,
        record: &'a OrderRecord,
    ) -> BoxFuture<'a, Result<(), RepositoryError>> {
        Box::pin(async move {
            self.insert_calls.fetch_add(1, Ordering::SeqCst);
            self.simulate_latency().await;
            if let Some(fault) = self.insert_faults.next() {
                return Err(fault.into_error("insert"));
            }

            let mut orders = self.orders.lock().unwrap();
            if orders.contains_key(record.id()) {
                return Err(RepositoryError::Database(format!(
                    "duplicate key value violates unique constraint \"orders_pkey\": {}",
                    record.id()
                )));
            }
            orders.insert(record.id().to_string(), record.clone());
            Ok(())
        })
    }

    fn list_created_since(
        &self,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<String>, RepositoryError>> {
        Box::pin(async move {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(fault) = self.list_faults.next() {
                return Err(fault.into_error("list"));
            }

            let orders = self.orders.lock().unwrap();
            let mut recent: Vec<_> = orders
                .values()
                .filter_map(|r| {
                    r.order
                        .date_created
                        .filter(|created| *created >= since)
                        .map(|created| (created, r.id().to_string()))
                })
                .collect();
            recent.sort();
            Ok(recent.into_iter().map(|(_, id)| id).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_order, sample_order_created_at};
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn scripted_faults_run_out() {
        let store = InMemoryOrderRepository::new();
        store.seed(sample_order("order-1"));
        store.fail_selects_after(1, Fault::TransactionClosed, 1);

        assert!(store.select("order-1").await.is_ok());
        assert!(matches!(
            store.select("order-1").await,
            Err(RepositoryError::TransactionClosed(_))
        ));
        assert!(store.select("order-1").await.is_ok());
        assert_eq!(store.select_calls(), 3);
    }

    #[tokio::test]
    async fn duplicate_insert_is_a_database_error() {
        let store = InMemoryOrderRepository::new();
        let record = sample_order("order-1");

        store.insert(&record).await.unwrap();
        let err = store.insert(&record).await.unwrap_err();

        assert!(matches!(err, RepositoryError::Database(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn listing_is_filtered_and_ordered_by_creation() {
        let store = InMemoryOrderRepository::new();
        let now = Utc::now();
        store.seed(sample_order_created_at("b", now - ChronoDuration::hours(1)));
        store.seed(sample_order_created_at("a", now - ChronoDuration::hours(2)));
        store.seed(sample_order_created_at("old", now - ChronoDuration::days(30)));

        let ids = store
            .list_created_since(now - ChronoDuration::days(7))
            .await
            .unwrap();

        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
