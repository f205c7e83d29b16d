//! Bounded retry with exponential backoff for transient store failures.
//!
//! Only errors classified as transient ([`RepositoryError::is_retryable`]) are
//! retried. Every other error is returned on the attempt that produced it.
//! Both the attempt itself and the wait that follows it are raced against the
//! caller's [`CallContext`], so a cancelled or timed-out caller gets the
//! context error back immediately.
//!
//! # Schedule
//!
//! With the default policy (5 attempts, 50ms initial delay, ×2) the waits are
//! 100ms, 200ms, 400ms and 800ms. There is no wait after the final attempt,
//! so a persistently transient failure costs exactly 1500ms of waiting before
//! [`RepositoryError::RetriesExhausted`] is returned.
//!
//! # Example
//!
//! ```rust
//! use orderstream_core::{CallContext, RepositoryError};
//! use orderstream_runtime::retry::{RetryPolicy, retry_with_context};
//!
//! # async fn example() -> Result<(), RepositoryError> {
//! let policy = RetryPolicy::default();
//! let ctx = CallContext::background();
//!
//! let value = retry_with_context(&policy, &ctx, "select", || async {
//!     Ok::<_, RepositoryError>(42)
//! })
//! .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use crate::metrics::RetryMetrics;
use orderstream_core::{CallContext, RepositoryError};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration for exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 5
/// - `initial_delay`: 50ms
/// - `max_delay`: 30 seconds
/// - `multiplier`: 2 (delay doubles before every wait)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Base delay; the first wait is already `initial_delay * multiplier`
    pub initial_delay: Duration,
    /// Maximum delay between attempts (cap for exponential backoff)
    pub max_delay: Duration,
    /// Integer growth factor per attempt
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_attempts: None,
            initial_delay: None,
            max_delay: None,
            multiplier: None,
        }
    }

    /// Wait taken after the `attempt`-th failure (1-based).
    ///
    /// `delay = initial_delay * multiplier ^ attempt`, capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.multiplier
            .checked_pow(attempt)
            .and_then(|factor| self.initial_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Sum of all waits taken when every attempt fails transiently.
    #[must_use]
    pub fn total_wait(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.delay_for_attempt(attempt))
            .sum()
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<u32>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<u32>,
}

impl RetryPolicyBuilder {
    /// Set maximum number of attempts (at least 1).
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set base delay.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set maximum delay (cap for exponential backoff).
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set multiplier for exponential backoff.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(5).max(1),
            initial_delay: self.initial_delay.unwrap_or(Duration::from_millis(50)),
            max_delay: self.max_delay.unwrap_or(Duration::from_secs(30)),
            multiplier: self.multiplier.unwrap_or(2),
        }
    }
}

/// Run `call` until it succeeds, fails terminally, exhausts the policy, or
/// `ctx` ends.
///
/// `operation` names the call in logs and in
/// [`RepositoryError::RetriesExhausted`].
///
/// # Errors
///
/// - The first non-retryable error from `call`
/// - [`RepositoryError::Context`] if `ctx` ends during an attempt or a wait
/// - [`RepositoryError::RetriesExhausted`] after `max_attempts` transient failures
pub async fn retry_with_context<T, F, Fut>(
    policy: &RetryPolicy,
    ctx: &CallContext,
    operation: &'static str,
    mut call: F,
) -> Result<T, RepositoryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RepositoryError>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = tokio::select! {
            biased;
            reason = ctx.done() => return Err(reason.into()),
            result = call() => result,
        };

        match result {
            Ok(value) => {
                if attempt > 1 {
                    RetryMetrics::record_success();
                    tracing::info!(operation, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if !err.is_retryable() => {
                tracing::debug!(
                    operation,
                    attempt,
                    error = %err,
                    "Error is not retryable, failing immediately"
                );
                return Err(err);
            }
            Err(err) => {
                if attempt >= policy.max_attempts {
                    RetryMetrics::record_exhausted();
                    tracing::error!(
                        operation,
                        attempt,
                        error = %err,
                        "Operation failed after max attempts"
                    );
                    return Err(RepositoryError::RetriesExhausted {
                        operation,
                        attempts: attempt,
                    });
                }

                let delay = policy.delay_for_attempt(attempt);
                RetryMetrics::record_attempt();
                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Operation failed, retrying..."
                );

                tokio::select! {
                    biased;
                    reason = ctx.done() => return Err(reason.into()),
                    () = sleep(delay) => {}
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use orderstream_core::ContextError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    fn failing(
        counter: &Arc<AtomicU32>,
        err: RepositoryError,
    ) -> impl FnMut() -> std::future::Ready<Result<(), RepositoryError>> {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Err(err.clone()))
        }
    }

    #[test]
    fn default_schedule_doubles_from_first_wait() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(800));
        assert_eq!(policy.total_wait(), Duration::from_millis(1500));
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_secs(1))
            .multiplier(10)
            .max_delay(Duration::from_secs(2))
            .build();

        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_secs(2));
    }

    proptest::proptest! {
        #[test]
        fn delays_never_shrink_and_never_exceed_cap(
            initial_ms in 1u64..1_000,
            multiplier in 1u32..8,
            max_ms in 1u64..60_000,
            attempt in 1u32..64,
        ) {
            let policy = RetryPolicy::builder()
                .initial_delay(Duration::from_millis(initial_ms))
                .multiplier(multiplier)
                .max_delay(Duration::from_millis(max_ms))
                .build();

            let this = policy.delay_for_attempt(attempt);
            let next = policy.delay_for_attempt(attempt + 1);
            proptest::prop_assert!(this <= policy.max_delay);
            proptest::prop_assert!(this <= next);
        }
    }

    #[tokio::test]
    async fn succeeds_on_first_try_without_waiting() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);

        let result = retry_with_context(
            &RetryPolicy::default(),
            &CallContext::background(),
            "select",
            || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, RepositoryError>(42) }
            },
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);

        let result = retry_with_context(
            &RetryPolicy::default(),
            &CallContext::background(),
            "insert",
            || {
                let attempt = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(RepositoryError::ConnectionClosed("reset".into()))
                    } else {
                        Ok(())
                    }
                }
            },
        )
        .await;

        assert_eq!(result, Ok(()));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_transient_failure_is_bounded_and_deterministic() {
        let counter = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = retry_with_context(
            &RetryPolicy::default(),
            &CallContext::background(),
            "insert",
            failing(&counter, RepositoryError::TransactionClosed("done".into())),
        )
        .await;

        assert_eq!(
            result,
            Err(RepositoryError::RetriesExhausted {
                operation: "insert",
                attempts: 5
            })
        );
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_errors_are_not_retried() {
        for err in [
            RepositoryError::NotFound("order-1".into()),
            RepositoryError::Database("duplicate key".into()),
        ] {
            let counter = Arc::new(AtomicU32::new(0));
            let start = Instant::now();

            let result = retry_with_context(
                &RetryPolicy::default(),
                &CallContext::background(),
                "select",
                failing(&counter, err.clone()),
            )
            .await;

            assert_eq!(result, Err(err));
            assert_eq!(counter.load(Ordering::SeqCst), 1);
            assert_eq!(start.elapsed(), Duration::ZERO);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_during_wait_returns_context_error() {
        let counter = Arc::new(AtomicU32::new(0));
        let ctx = CallContext::background().with_timeout(Duration::from_millis(250));

        let result = retry_with_context(
            &RetryPolicy::default(),
            &ctx,
            "select",
            failing(&counter, RepositoryError::ConnectionClosed("eof".into())),
        )
        .await;

        // Attempts at 0ms and 100ms; the 200ms wait is cut short at 250ms.
        assert_eq!(result, Err(RepositoryError::Context(ContextError::DeadlineExceeded)));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_wait_returns_context_error() {
        let token = CancellationToken::new();
        let ctx = CallContext::new(token.clone());
        let counter = Arc::new(AtomicU32::new(0));

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let result = retry_with_context(
            &RetryPolicy::default(),
            &ctx,
            "insert",
            failing(&counter, RepositoryError::ConnectionClosed("eof".into())),
        )
        .await;

        canceller.await.unwrap();
        assert_eq!(result, Err(RepositoryError::Context(ContextError::Cancelled)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_is_bounded_by_deadline() {
        let ctx = CallContext::background().with_timeout(Duration::from_secs(4));
        let start = Instant::now();

        let result = retry_with_context(&RetryPolicy::default(), &ctx, "select", || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, RepositoryError>(())
        })
        .await;

        assert_eq!(result, Err(RepositoryError::Context(ContextError::DeadlineExceeded)));
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }
}
