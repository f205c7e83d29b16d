//! Cancellation and deadline propagation for blocking calls.
//!
//! A [`CallContext`] travels with every persistence call. It combines the
//! process-wide cancellation token with an optional deadline, and retry waits
//! race against [`CallContext::done`] so that a cancelled or timed-out caller
//! is released immediately with a [`ContextError`] instead of the error of the
//! operation being retried.
//!
//! # Example
//!
//! ```
//! use orderstream_core::context::{CallContext, ContextError};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let shutdown = CancellationToken::new();
//! let ctx = CallContext::new(shutdown.clone()).with_timeout(Duration::from_secs(4));
//!
//! shutdown.cancel();
//! assert_eq!(ctx.done().await, ContextError::Cancelled);
//! # }
//! ```

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a [`CallContext`] ended.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// The cancellation token fired.
    #[error("context cancelled")]
    Cancelled,

    /// The deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation token plus optional deadline.
///
/// Cloning is cheap. Contexts derived with [`with_timeout`](Self::with_timeout)
/// observe the parent's cancellation but never cancel the parent.
#[derive(Debug, Clone)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Create a context bound to `token` with no deadline.
    #[must_use]
    pub const fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// A context that is never cancelled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::new(CancellationToken::new())
    }

    /// Derive a child context that also ends `timeout` from now.
    ///
    /// If the parent already has an earlier deadline it is kept.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };

        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// The deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The underlying cancellation token.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Non-blocking check: `Some(reason)` once the context has ended.
    #[must_use]
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolve when the context ends, with the reason.
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                () = self.token.cancelled() => ContextError::Cancelled,
                () = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ContextError::Cancelled
            }
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::background()
    }
}
