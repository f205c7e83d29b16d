//! Message transport capabilities for the ingestion pipeline.
//!
//! The pipeline reads Order Records from a [`MessageSource`] and writes
//! dead-lettered messages to a [`MessageSink`]. Both are dyn-compatible so the
//! broker-backed implementations and the in-memory doubles are interchangeable.
//!
//! # Delivery Semantics
//!
//! - **At-least-once**: a message is redelivered until it is acknowledged
//! - **Ordered within partition**: [`MessageSource::receive`] yields messages of
//!   one partition in offset order
//! - **Explicit acknowledgement**: the pipeline calls [`MessageSource::ack`]
//!   once a message has been fully handled (stored, dropped, or dead-lettered)
//!
//! # Implementations
//!
//! - `RedpandaSource` / `RedpandaSink` (in `orderstream-redpanda`): Kafka-compatible
//! - `InMemorySource` / `InMemorySink` (in `orderstream-testing`): for tests

use crate::BoxFuture;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from the message transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Failed to connect to the broker
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Fetching the next message failed
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Failed to publish a message to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to record the consumed offset
    #[error("Commit failed: {0}")]
    CommitFailed(String),

    /// The source is closed and will yield no more messages
    #[error("Message source closed")]
    Closed,
}

/// A single key/value header carried with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    /// Header name.
    pub key: String,
    /// Raw header value.
    pub value: Vec<u8>,
}

impl MessageHeader {
    /// Build a header from anything string- and byte-like.
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A message read from the order topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was read from.
    pub topic: String,
    /// Partition within the topic.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
    /// Message key, if any.
    pub key: Option<Vec<u8>>,
    /// Raw payload (expected to be a JSON Order Record).
    pub payload: Vec<u8>,
    /// Transport headers.
    pub headers: Vec<MessageHeader>,
    /// Broker timestamp, if the broker provided one.
    pub timestamp: Option<DateTime<Utc>>,
}

impl InboundMessage {
    /// A message with only topic and payload set; used by producers and tests.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            partition: 0,
            offset: 0,
            key: None,
            payload: payload.into(),
            headers: Vec::new(),
            timestamp: None,
        }
    }

    /// Set the message key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, header: MessageHeader) -> Self {
        self.headers.push(header);
        self
    }

    /// Set partition and offset.
    #[must_use]
    pub const fn at(mut self, partition: i32, offset: i64) -> Self {
        self.partition = partition;
        self.offset = offset;
        self
    }
}

/// A message to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Message key, if any.
    pub key: Option<Vec<u8>>,
    /// Raw payload.
    pub payload: Vec<u8>,
    /// Transport headers.
    pub headers: Vec<MessageHeader>,
}

impl OutboundMessage {
    /// A message with no key and no headers.
    #[must_use]
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            key: None,
            payload: payload.into(),
            headers: Vec::new(),
        }
    }

    /// Set the message key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, header: MessageHeader) -> Self {
        self.headers.push(header);
        self
    }

    /// Look up a header value by name (first match).
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|h| h.key == key)
            .map(|h| h.value.as_slice())
    }
}

/// Where the pipeline reads messages from.
pub trait MessageSource: Send + Sync {
    /// Wait for the next message.
    ///
    /// # Errors
    ///
    /// - [`BusError::ReceiveFailed`] on transient transport errors (the caller
    ///   backs off and calls again)
    /// - [`BusError::Closed`] when the source will never yield again
    fn receive(&self) -> BoxFuture<'_, Result<InboundMessage, BusError>>;

    /// Mark `message` as handled so it is not redelivered.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::CommitFailed`] if the offset could not be recorded.
    fn ack<'a>(&'a self, message: &'a InboundMessage) -> BoxFuture<'a, Result<(), BusError>>;
}

/// Where the pipeline publishes messages to (the dead-letter topic).
pub trait MessageSink: Send + Sync {
    /// Publish one message and wait for the broker's acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::PublishFailed`] if delivery could not be confirmed.
    fn send(&self, message: OutboundMessage) -> BoxFuture<'_, Result<(), BusError>>;

    /// The topic this sink publishes to.
    fn topic(&self) -> &str;
}
