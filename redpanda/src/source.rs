//! Consumer-group backed [`MessageSource`].

use chrono::{DateTime, Utc};
use orderstream_core::BoxFuture;
use orderstream_core::message::{BusError, InboundMessage, MessageHeader, MessageSource};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use rdkafka::{Offset, TopicPartitionList};

/// Reads Order Records from one topic as a member of a consumer group.
///
/// Offsets are committed explicitly through [`MessageSource::ack`], so a
/// message that was received but never acknowledged is redelivered after a
/// restart or rebalance.
///
/// # Example
///
/// ```no_run
/// use orderstream_redpanda::RedpandaSource;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let source = RedpandaSource::builder()
///     .brokers("localhost:9092")
///     .topic("orders")
///     .consumer_group("order-service")
///     .auto_offset_reset("earliest")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaSource {
    consumer: StreamConsumer,
    topic: String,
    consumer_group: String,
}

impl RedpandaSource {
    /// Create a new builder for configuring the source.
    #[must_use]
    pub fn builder() -> RedpandaSourceBuilder {
        RedpandaSourceBuilder::default()
    }

    /// The subscribed topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The consumer group this source belongs to.
    #[must_use]
    pub fn consumer_group(&self) -> &str {
        &self.consumer_group
    }
}

/// Builder for configuring a [`RedpandaSource`].
#[derive(Default)]
pub struct RedpandaSourceBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    consumer_group: Option<String>,
    auto_offset_reset: Option<String>,
    session_timeout_ms: Option<u32>,
}

impl RedpandaSourceBuilder {
    /// Set the broker addresses.
    ///
    /// # Parameters
    ///
    /// - `brokers`: Comma-separated list of broker addresses (e.g., "localhost:9092")
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the topic to consume.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the consumer group ID.
    ///
    /// Instances sharing a group split the topic's partitions between them.
    /// Default: `"orderstream-<topic>"`.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Set the auto offset reset policy for a group with no committed offset.
    ///
    /// - `"earliest"`: Start from the beginning of the topic
    /// - `"latest"`: Start from the end (only new messages)
    ///
    /// Default: `"earliest"`
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Set the consumer session timeout in milliseconds.
    ///
    /// Default: 6000
    #[must_use]
    pub const fn session_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.session_timeout_ms = Some(timeout_ms);
        self
    }

    /// Build the [`RedpandaSource`] and subscribe to the topic.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ConnectionFailed`] if:
    /// - Brokers or topic not set
    /// - Cannot create the consumer
    /// - The subscription is rejected
    pub fn build(self) -> Result<RedpandaSource, BusError> {
        let brokers = self
            .brokers
            .ok_or_else(|| BusError::ConnectionFailed("Brokers not configured".to_string()))?;
        let topic = self
            .topic
            .ok_or_else(|| BusError::ConnectionFailed("Topic not configured".to_string()))?;
        let consumer_group = self
            .consumer_group
            .unwrap_or_else(|| format!("orderstream-{topic}"));
        let auto_offset_reset = self
            .auto_offset_reset
            .unwrap_or_else(|| "earliest".to_string());
        let session_timeout_ms = self.session_timeout_ms.unwrap_or(6000);

        // Manual commit for at-least-once
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("group.id", &consumer_group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &auto_offset_reset)
            .set("session.timeout.ms", session_timeout_ms.to_string())
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| BusError::ConnectionFailed(format!("Failed to create consumer: {e}")))?;

        consumer.subscribe(&[topic.as_str()]).map_err(|e| {
            BusError::ConnectionFailed(format!("Failed to subscribe to topic '{topic}': {e}"))
        })?;

        tracing::info!(
            brokers = %brokers,
            topic = %topic,
            consumer_group = %consumer_group,
            auto_offset_reset = %auto_offset_reset,
            manual_commit = true,
            "RedpandaSource subscribed"
        );

        Ok(RedpandaSource {
            consumer,
            topic,
            consumer_group,
        })
    }
}

/// Copy a borrowed broker message into an owned [`InboundMessage`].
fn to_inbound(message: &BorrowedMessage<'_>) -> InboundMessage {
    let headers = message
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|header| MessageHeader::new(header.key, header.value.unwrap_or_default()))
                .collect()
        })
        .unwrap_or_default();

    InboundMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(<[u8]>::to_vec),
        payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        headers,
        timestamp: message
            .timestamp()
            .to_millis()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
    }
}

impl MessageSource for RedpandaSource {
    fn receive(&self) -> BoxFuture<'_, Result<InboundMessage, BusError>> {
        Box::pin(async move {
            match self.consumer.recv().await {
                Ok(message) => {
                    let inbound = to_inbound(&message);
                    tracing::trace!(
                        topic = %inbound.topic,
                        partition = inbound.partition,
                        offset = inbound.offset,
                        bytes = inbound.payload.len(),
                        "Received message"
                    );
                    Ok(inbound)
                }
                Err(e) => Err(BusError::ReceiveFailed(e.to_string())),
            }
        })
    }

    fn ack<'a>(&'a self, message: &'a InboundMessage) -> BoxFuture<'a, Result<(), BusError>> {
        Box::pin(async move {
            // The committed offset is the next one to read.
            let mut offsets = TopicPartitionList::new();
            offsets
                .add_partition_offset(
                    &message.topic,
                    message.partition,
                    Offset::Offset(message.offset + 1),
                )
                .map_err(|e| BusError::CommitFailed(e.to_string()))?;

            self.consumer
                .commit(&offsets, CommitMode::Async)
                .map_err(|e| {
                    tracing::warn!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        error = %e,
                        "Failed to commit offset (message may be redelivered)"
                    );
                    BusError::CommitFailed(e.to_string())
                })
        })
    }
}
