//! Ingestion pipeline with dead-letter handling.
//!
//! Each message moves through
//!
//! ```text
//! Received ─► Decoded ─► Validated ─► Persisted                      (ack)
//!                 │           │            │
//!                 └─ invalid ─┘            └─ PersistFailed ─► Retried(n) ─► DeadLettered (ack)
//!                       │
//!                       └─► dropped (ack), or dead-lettered when configured
//! ```
//!
//! # Retry budget
//!
//! Retries are layered on purpose and the total is fixed: up to
//! [`PipelineConfig::max_attempts`] outer attempts (default 3, waiting
//! `attempt × attempt_backoff` between them), each calling
//! [`OrderPersistence::insert_with_retry`] with its own 5-attempt budget.
//! A message that keeps failing transiently therefore costs at most
//! `3 × 5 = 15` store calls before it is dead-lettered. Only exhausted or
//! transient store errors earn another outer attempt; any other store error
//! dead-letters the message straight away.
//!
//! # Shutdown
//!
//! [`IngestionPipeline::run`] stops taking new messages once the shutdown
//! token fires. A message already being processed runs to completion under
//! its own context, which the shutdown token does not cancel.

use crate::metrics::IngestMetrics;
use orderstream_core::cache::OrderCache;
use orderstream_core::environment::{Clock, SystemClock};
use orderstream_core::message::{
    BusError, InboundMessage, MessageHeader, MessageSink, MessageSource, OutboundMessage,
};
use orderstream_core::repository::OrderPersistence;
use orderstream_core::validation::{ValidationError, validate_at};
use orderstream_core::{CallContext, OrderRecord, RepositoryError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Dead-letter header carrying the source topic.
pub const HEADER_ORIGINAL_TOPIC: &str = "original_topic";
/// Dead-letter header carrying the failure description.
pub const HEADER_ERROR: &str = "error";
/// Dead-letter header carrying the RFC3339 time of dead-lettering.
pub const HEADER_TIMESTAMP: &str = "timestamp";

/// Why one processing attempt failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// The payload is not a JSON Order Record.
    #[error("failed to decode order: {0}")]
    Decode(String),

    /// The record failed validation.
    #[error("invalid order: {0}")]
    Validation(#[from] ValidationError),

    /// The store rejected or could not take the record.
    #[error("failed to persist order: {0}")]
    Persistence(#[from] RepositoryError),
}

impl IngestError {
    /// Decode and validation failures; never worth another attempt.
    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Validation(_))
    }

    /// Whether another outer attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Persistence(err) => err.is_exhausted() || err.is_retryable(),
            Self::Decode(_) | Self::Validation(_) => false,
        }
    }
}

/// What happened to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Stored and cached.
    Persisted {
        /// Id of the stored order.
        order_id: String,
    },
    /// Dropped as undecodable or invalid.
    Dropped(IngestError),
    /// Forwarded to the dead-letter topic.
    DeadLettered(IngestError),
    /// Should have been dead-lettered, but the dead-letter write failed too.
    DeadLetterFailed {
        /// The processing failure.
        error: IngestError,
        /// The dead-letter write failure.
        sink_error: BusError,
    },
    /// The processing context ended before the message was handled.
    Cancelled,
}

impl ProcessOutcome {
    /// Whether the message is drained from the main stream.
    #[must_use]
    pub const fn is_handled(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// Tunables for [`IngestionPipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Outer attempts per message (each runs decode, validate and persist).
    pub max_attempts: u32,
    /// Linear backoff unit between outer attempts.
    pub attempt_backoff: Duration,
    /// Dead-letter undecodable or invalid messages instead of dropping them.
    pub dead_letter_invalid: bool,
    /// Pause after a transport receive error.
    pub receive_error_backoff: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_backoff: Duration::from_secs(1),
            dead_letter_invalid: false,
            receive_error_backoff: Duration::from_secs(1),
        }
    }
}

/// Counts of message outcomes over one [`IngestionPipeline::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Messages received.
    pub received: u64,
    /// Messages stored.
    pub persisted: u64,
    /// Messages dropped as invalid.
    pub dropped: u64,
    /// Messages dead-lettered.
    pub dead_lettered: u64,
    /// Dead-letter writes that failed.
    pub dead_letter_failed: u64,
    /// Transport receive errors.
    pub receive_errors: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: &ProcessOutcome) {
        match outcome {
            ProcessOutcome::Persisted { .. } => self.persisted += 1,
            ProcessOutcome::Dropped(_) => self.dropped += 1,
            ProcessOutcome::DeadLettered(_) => self.dead_lettered += 1,
            ProcessOutcome::DeadLetterFailed { .. } => self.dead_letter_failed += 1,
            ProcessOutcome::Cancelled => {}
        }
    }
}

/// Consumes Order Records, validates and stores them, dead-letters failures.
pub struct IngestionPipeline {
    source: Arc<dyn MessageSource>,
    dead_letters: Arc<dyn MessageSink>,
    persistence: Arc<dyn OrderPersistence>,
    cache: Arc<dyn OrderCache>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("dead_letter_topic", &self.dead_letters.topic())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IngestionPipeline {
    /// Create a pipeline with default configuration and the system clock.
    #[must_use]
    pub fn new(
        source: Arc<dyn MessageSource>,
        dead_letters: Arc<dyn MessageSink>,
        persistence: Arc<dyn OrderPersistence>,
        cache: Arc<dyn OrderCache>,
    ) -> Self {
        Self {
            source,
            dead_letters,
            persistence,
            cache,
            clock: Arc::new(SystemClock),
            config: PipelineConfig::default(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the clock used for validation and dead-letter timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Consume until `shutdown` fires or the source closes.
    ///
    /// Transport errors are logged and retried after
    /// [`PipelineConfig::receive_error_backoff`]; they never end the loop.
    pub async fn run(&self, shutdown: CancellationToken) -> RunSummary {
        let processing = CallContext::background();
        let mut summary = RunSummary::default();

        tracing::info!(
            dead_letter_topic = %self.dead_letters.topic(),
            max_attempts = self.config.max_attempts,
            "Ingestion pipeline started"
        );

        loop {
            let received = tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    tracing::info!("Shutdown signal received, stopping ingestion");
                    break;
                }
                received = self.source.receive() => received,
            };

            let message = match received {
                Ok(message) => message,
                Err(BusError::Closed) => {
                    tracing::info!("Message source closed, stopping ingestion");
                    break;
                }
                Err(err) => {
                    summary.receive_errors += 1;
                    IngestMetrics::record_receive_error();
                    tracing::error!(error = %err, "Failed to receive message");

                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = sleep(self.config.receive_error_backoff) => continue,
                    }
                }
            };

            summary.received += 1;
            IngestMetrics::record_received();

            let outcome = self.process_message(&processing, &message).await;
            summary.record(&outcome);

            if outcome.is_handled() {
                if let Err(err) = self.source.ack(&message).await {
                    tracing::warn!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        error = %err,
                        "Failed to acknowledge message"
                    );
                }
            }
        }

        tracing::info!(
            received = summary.received,
            persisted = summary.persisted,
            dropped = summary.dropped,
            dead_lettered = summary.dead_lettered,
            "Ingestion pipeline stopped"
        );
        summary
    }

    /// Take one message through decode, validate, persist and, on failure,
    /// the dead-letter path.
    pub async fn process_message(
        &self,
        ctx: &CallContext,
        message: &InboundMessage,
    ) -> ProcessOutcome {
        let mut attempt = 0;

        let failure = loop {
            attempt += 1;

            match self.attempt(ctx, message).await {
                Ok(record) => {
                    let order_id = record.id().to_string();
                    self.cache.set(&order_id, Arc::new(record));
                    IngestMetrics::record_persisted();
                    tracing::info!(
                        order_id = %order_id,
                        partition = message.partition,
                        offset = message.offset,
                        attempt,
                        "Order persisted"
                    );
                    return ProcessOutcome::Persisted { order_id };
                }
                Err(IngestError::Persistence(err)) if err.is_context() => {
                    tracing::warn!(offset = message.offset, error = %err, "Processing cancelled");
                    return ProcessOutcome::Cancelled;
                }
                Err(err) if err.is_invalid() => {
                    IngestMetrics::record_invalid();
                    if !self.config.dead_letter_invalid {
                        tracing::warn!(
                            partition = message.partition,
                            offset = message.offset,
                            error = %err,
                            "Dropping invalid message"
                        );
                        return ProcessOutcome::Dropped(err);
                    }
                    break err;
                }
                Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
                    let delay = self.config.attempt_backoff * attempt;
                    tracing::warn!(
                        offset = message.offset,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Failed to persist order, retrying"
                    );

                    tokio::select! {
                        biased;
                        _ = ctx.done() => return ProcessOutcome::Cancelled,
                        () = sleep(delay) => {}
                    }
                }
                Err(err) => break err,
            }
        };

        self.dead_letter(message, failure).await
    }

    async fn attempt(
        &self,
        ctx: &CallContext,
        message: &InboundMessage,
    ) -> Result<OrderRecord, IngestError> {
        let record = OrderRecord::from_json(&message.payload)
            .map_err(|e| IngestError::Decode(e.to_string()))?;
        validate_at(&record, self.clock.now())?;
        self.persistence.insert_with_retry(ctx, &record).await?;
        Ok(record)
    }

    async fn dead_letter(&self, message: &InboundMessage, error: IngestError) -> ProcessOutcome {
        let mut envelope = OutboundMessage::new(message.payload.clone());
        envelope.key.clone_from(&message.key);
        envelope.headers.clone_from(&message.headers);
        let envelope = envelope
            .with_header(MessageHeader::new(HEADER_ORIGINAL_TOPIC, message.topic.as_str()))
            .with_header(MessageHeader::new(HEADER_ERROR, error.to_string()))
            .with_header(MessageHeader::new(
                HEADER_TIMESTAMP,
                self.clock.now().to_rfc3339(),
            ));

        match self.dead_letters.send(envelope).await {
            Ok(()) => {
                IngestMetrics::record_dead_lettered();
                tracing::warn!(
                    topic = %self.dead_letters.topic(),
                    offset = message.offset,
                    error = %error,
                    "Message sent to dead-letter topic"
                );
                ProcessOutcome::DeadLettered(error)
            }
            Err(sink_error) => {
                IngestMetrics::record_dead_letter_failure();
                tracing::error!(
                    topic = %self.dead_letters.topic(),
                    offset = message.offset,
                    error = %error,
                    sink_error = %sink_error,
                    "Failed to write message to dead-letter topic"
                );
                ProcessOutcome::DeadLetterFailed { error, sink_error }
            }
        }
    }
}
