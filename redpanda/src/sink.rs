//! Producer backed [`MessageSink`].

use orderstream_core::BoxFuture;
use orderstream_core::message::{BusError, MessageSink, OutboundMessage};
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;

/// Publishes messages to a single topic.
///
/// The service uses one sink for the dead-letter topic; the demo producer
/// uses another for the order topic.
///
/// # Example
///
/// ```no_run
/// use orderstream_redpanda::RedpandaSink;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let sink = RedpandaSink::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .topic("orders-dlq")
///     .producer_acks("all")
///     .compression("lz4")
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaSink {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl RedpandaSink {
    /// Create a new builder for configuring the sink.
    #[must_use]
    pub fn builder() -> RedpandaSinkBuilder {
        RedpandaSinkBuilder::default()
    }
}

/// Builder for configuring a [`RedpandaSink`].
#[derive(Default)]
pub struct RedpandaSinkBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
}

impl RedpandaSinkBuilder {
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

    /// Set the destination topic.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the producer acknowledgment mode.
    ///
    /// # Parameters
    ///
    /// - `acks`: "0" (no acks), "1" (leader ack), "all" (all replicas ack)
    ///
    /// Default: "all"
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Set the compression codec.
    ///
    /// # Parameters
    ///
    /// - `compression`: "none", "gzip", "snappy", "lz4", "zstd"
    ///
    /// Default: "none"
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Set the producer send timeout.
    ///
    /// Default: 5 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the [`RedpandaSink`].
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ConnectionFailed`] if:
    /// - Brokers or topic not set
    /// - Cannot create producer
    /// - Invalid configuration
    pub fn build(self) -> Result<RedpandaSink, BusError> {
        let brokers = self
            .brokers
            .ok_or_else(|| BusError::ConnectionFailed("Brokers not configured".to_string()))?;
        let topic = self
            .topic
            .ok_or_else(|| BusError::ConnectionFailed("Topic not configured".to_string()))?;
        let acks = self.producer_acks.as_deref().unwrap_or("all");
        let compression = self.compression.as_deref().unwrap_or("none");
        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", acks)
            .set("compression.type", compression)
            .create()
            .map_err(|e| BusError::ConnectionFailed(format!("Failed to create producer: {e}")))?;

        tracing::info!(
            brokers = %brokers,
            topic = %topic,
            acks,
            compression,
            "RedpandaSink created successfully"
        );

        Ok(RedpandaSink {
            producer,
            topic,
            timeout,
        })
    }
}

impl MessageSink for RedpandaSink {
    fn send(&self, message: OutboundMessage) -> BoxFuture<'_, Result<(), BusError>> {
        Box::pin(async move {
            let headers = message
                .headers
                .iter()
                .fold(OwnedHeaders::new(), |headers, header| {
                    headers.insert(Header {
                        key: &header.key,
                        value: Some(header.value.as_slice()),
                    })
                });

            let mut record = FutureRecord::<[u8], [u8]>::to(&self.topic)
                .payload(message.payload.as_slice())
                .headers(headers);
            if let Some(key) = &message.key {
                record = record.key(key.as_slice());
            }

            match self.producer.send(record, Timeout::After(self.timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %self.topic,
                        partition,
                        offset,
                        "Message published successfully"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(
                        topic = %self.topic,
                        error = %kafka_error,
                        "Failed to publish message"
                    );
                    Err(BusError::PublishFailed {
                        topic: self.topic.clone(),
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}
