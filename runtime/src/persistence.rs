//! Retrying persistence wrapper.
//!
//! [`RetryingRepository`] turns any [`OrderRepository`] into an
//! [`OrderPersistence`]: single-attempt calls pass straight through, the
//! `*_with_retry` variants run under a [`RetryPolicy`] and the caller's
//! [`CallContext`].

use crate::retry::{RetryPolicy, retry_with_context};
use orderstream_core::BoxFuture;
use orderstream_core::repository::{OrderPersistence, OrderRepository};
use orderstream_core::{CallContext, DateTime, OrderRecord, RepositoryError, Utc};
use std::sync::Arc;

/// Record Store access with bounded retry on transient failures.
#[derive(Clone)]
pub struct RetryingRepository {
    inner: Arc<dyn OrderRepository>,
    policy: RetryPolicy,
}

impl RetryingRepository {
    /// Wrap `inner` with the default policy (5 attempts, 100/200/400/800ms waits).
    #[must_use]
    pub fn new(inner: Arc<dyn OrderRepository>) -> Self {
        Self {
            inner,
            policy: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The active retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl std::fmt::Debug for RetryingRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingRepository")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl OrderPersistence for RetryingRepository {
    fn select<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<OrderRecord, RepositoryError>> {
        self.inner.select(id)
    }

    fn select_with_retry<'a>(
        &'a self,
        ctx: &'a CallContext,
        id: &'a str,
    ) -> BoxFuture<'a, Result<OrderRecord, RepositoryError>> {
        Box::pin(retry_with_context(&self.policy, ctx, "select", move || {
            self.inner.select(id)
        }))
    }

    fn insert<'a>(
        &'a self,
        record: &'a OrderRecord,
    ) -> BoxFuture<'a, Result<(), RepositoryError>> {
        self.inner.insert(record)
    }

    fn insert_with_retry<'a>(
        &'a self,
        ctx: &'a CallContext,
        record: &'a OrderRecord,
    ) -> BoxFuture<'a, Result<(), RepositoryError>> {
        Box::pin(retry_with_context(&self.policy, ctx, "insert", move || {
            self.inner.insert(record)
        }))
    }

    fn list_created_since<'a>(
        &'a self,
        ctx: &'a CallContext,
        since: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<Vec<String>, RepositoryError>> {
        Box::pin(async move {
            tokio::select! {
                biased;
                reason = ctx.done() => Err(reason.into()),
                result = self.inner.list_created_since(since) => result,
            }
        })
    }
}
