//! Redpanda transport for the order service.
//!
//! This crate provides the Kafka-compatible implementations of the transport
//! capabilities from `orderstream-core`:
//!
//! - [`RedpandaSource`]: a consumer-group member reading the order topic
//!   ([`MessageSource`](orderstream_core::message::MessageSource))
//! - [`RedpandaSink`]: a producer writing to a single topic, used for the
//!   dead-letter queue and by the demo producer
//!   ([`MessageSink`](orderstream_core::message::MessageSink))
//!
//! Both use rdkafka, so any Kafka-compatible broker works (Redpanda, Apache
//! Kafka, MSK).
//!
//! # Delivery Semantics
//!
//! **At-least-once delivery** with manual offset commits:
//! - Auto-commit is disabled; the offset of a message is committed only when
//!   the pipeline calls `ack` after the message has been handled
//! - If the process stops before `ack`, the message is redelivered to the
//!   consumer group
//! - Ordering is guaranteed within a partition
//!
//! # Example
//!
//! ```no_run
//! use orderstream_redpanda::{RedpandaSink, RedpandaSource};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = RedpandaSource::builder()
//!     .brokers("localhost:9092")
//!     .topic("orders")
//!     .consumer_group("order-service")
//!     .build()?;
//!
//! let dead_letters = RedpandaSink::builder()
//!     .brokers("localhost:9092")
//!     .topic("orders-dlq")
//!     .producer_acks("all")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod sink;
mod source;

pub use sink::{RedpandaSink, RedpandaSinkBuilder};
pub use source::{RedpandaSource, RedpandaSourceBuilder};
