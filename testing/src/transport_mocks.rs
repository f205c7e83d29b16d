//! In-memory message transport.
//!
//! [`InMemorySource`] replays a scripted queue of messages and errors, then
//! reports [`BusError::Closed`] once closed and drained. [`InMemorySink`]
//! records everything it is asked to publish.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use orderstream_core::BoxFuture;
use orderstream_core::message::{BusError, InboundMessage, MessageSink, MessageSource, OutboundMessage};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Scripted message source.
///
/// `receive` waits while the queue is empty and the source is open.
#[derive(Debug, Default)]
pub struct InMemorySource {
    queue: Mutex<VecDeque<Result<InboundMessage, BusError>>>,
    closed: AtomicBool,
    notify: Notify,
    acked: Mutex<Vec<InboundMessage>>,
}

impl InMemorySource {
    /// Create an open, empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message.
    pub fn push(&self, message: InboundMessage) {
        self.queue.lock().unwrap().push_back(Ok(message));
        self.notify.notify_one();
    }

    /// Queue a transport error.
    pub fn push_error(&self, error: BusError) {
        self.queue.lock().unwrap().push_back(Err(error));
        self.notify.notify_one();
    }

    /// Report [`BusError::Closed`] once the queue is drained.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Offsets of acknowledged messages, in acknowledgement order.
    #[must_use]
    pub fn acked(&self) -> Vec<i64> {
        self.acked.lock().unwrap().iter().map(|m| m.offset).collect()
    }

    /// Acknowledged messages, in acknowledgement order.
    #[must_use]
    pub fn acked_messages(&self) -> Vec<InboundMessage> {
        self.acked.lock().unwrap().clone()
    }

    /// Messages still queued.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}

impl MessageSource for InMemorySource {
    fn receive(&self) -> BoxFuture<'_, Result<InboundMessage, BusError>> {
        Box::pin(async move {
            loop {
                let next = self.queue.lock().unwrap().pop_front();
                if let Some(next) = next {
                    return next;
                }
                if self.closed.load(Ordering::SeqCst) {
                    return Err(BusError::Closed);
                }
                self.notify.notified().await;
            }
        })
    }

    fn ack<'a>(&'a self, message: &'a InboundMessage) -> BoxFuture<'a, Result<(), BusError>> {
        Box::pin(async move {
            self.acked.lock().unwrap().push(message.clone());
            Ok(())
        })
    }
}

/// Recording message sink.
#[derive(Debug)]
pub struct InMemorySink {
    topic: String,
    sent: Mutex<Vec<OutboundMessage>>,
    failures: AtomicUsize,
}

impl InMemorySink {
    /// Create a sink that reports `topic` as its destination.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            sent: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(0),
        }
    }

    /// Fail the next `times` sends.
    pub fn fail_sends(&self, times: usize) {
        self.failures.store(times, Ordering::SeqCst);
    }

    /// Everything successfully sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl MessageSink for InMemorySink {
    fn send(&self, message: OutboundMessage) -> BoxFuture<'_, Result<(), BusError>> {
        Box::pin(async move {
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(BusError::PublishFailed {
                    topic: self.topic.clone(),
                    reason: "injected failure".to_string(),
                });
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        })
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn source_yields_in_order_then_closes() {
        let source = InMemorySource::new();
        source.push(InboundMessage::new("orders", b"a".to_vec()).at(0, 0));
        source.push_error(BusError::ReceiveFailed("timeout".into()));
        source.close();

        assert_eq!(source.receive().await.unwrap().offset, 0);
        assert!(matches!(source.receive().await, Err(BusError::ReceiveFailed(_))));
        assert_eq!(source.receive().await, Err(BusError::Closed));
    }

    #[tokio::test]
    async fn receive_waits_for_push() {
        let source = Arc::new(InMemorySource::new());
        let reader = {
            let source = Arc::clone(&source);
            tokio::spawn(async move { source.receive().await })
        };

        tokio::task::yield_now().await;
        source.push(InboundMessage::new("orders", b"late".to_vec()));

        assert_eq!(reader.await.unwrap().unwrap().payload, b"late".to_vec());
    }

    #[tokio::test]
    async fn sink_fails_then_records() {
        let sink = InMemorySink::new("orders-dlq");
        sink.fail_sends(1);

        assert!(sink.send(OutboundMessage::new(b"x".to_vec())).await.is_err());
        assert!(sink.send(OutboundMessage::new(b"y".to_vec())).await.is_ok());
        assert_eq!(sink.sent().len(), 1);
        assert_eq!(sink.topic(), "orders-dlq");
    }
}
