//! Integration tests for [`RedpandaSource`] and [`RedpandaSink`] with a real Kafka instance.
//!
//! These tests use testcontainers to spin up a real Kafka instance and validate:
//! - Sink to source round trip of key, payload and headers
//! - Acknowledged offsets are not redelivered to the consumer group
//! - Unacknowledged messages are redelivered
//!
//! # Running These Tests
//!
//! These tests are marked as `#[ignore]` by default because they:
//! - Require Docker to be running (for testcontainers)
//! - Take 15-60 seconds per test to spin up Kafka
//!
//! To run explicitly:
//! ```bash
//! cargo test -p orderstream-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used, clippy::unwrap_used)]
#![allow(clippy::panic)]

use orderstream_core::message::{MessageHeader, MessageSink, MessageSource, OutboundMessage};
use orderstream_redpanda::{RedpandaSink, RedpandaSource};
use orderstream_testing::fixtures::sample_order;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};

/// Start Kafka and wait until a producer can publish.
async fn start_kafka() -> (ContainerAsync<Kafka>, String) {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    let brokers = format!("{host}:{port}");

    let max_attempts = 60;
    for attempt in 1..=max_attempts {
        if let Ok(sink) = RedpandaSink::builder()
            .brokers(&brokers)
            .topic("warmup-topic")
            .build()
        {
            if sink.send(OutboundMessage::new(vec![1, 2, 3])).await.is_ok() {
                // Give Kafka time to fully initialize
                tokio::time::sleep(Duration::from_millis(500)).await;
                return (kafka, brokers);
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(
            attempt != max_attempts,
            "Kafka failed to become ready after {max_attempts} attempts"
        );
    }
    unreachable!("readiness loop either returns or asserts")
}

fn source(brokers: &str, topic: &str, group: &str) -> RedpandaSource {
    RedpandaSource::builder()
        .brokers(brokers)
        .topic(topic)
        .consumer_group(group)
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create source")
}

fn sink(brokers: &str, topic: &str) -> RedpandaSink {
    RedpandaSink::builder()
        .brokers(brokers)
        .topic(topic)
        .build()
        .expect("Failed to create sink")
}

#[tokio::test]
#[ignore]
async fn sink_to_source_round_trip_keeps_key_payload_and_headers() {
    let (_kafka, brokers) = start_kafka().await;
    let payload = serde_json::to_vec(&sample_order("b563feb7b2b84b6test")).unwrap();

    sink(&brokers, "orders")
        .send(
            OutboundMessage::new(payload.clone())
                .with_key(b"b563feb7b2b84b6test".to_vec())
                .with_header(MessageHeader::new("origin", "producer")),
        )
        .await
        .expect("Failed to publish");

    let source = source(&brokers, "orders", "round-trip");
    let received = tokio::time::timeout(Duration::from_secs(30), source.receive())
        .await
        .expect("Timeout waiting for message")
        .expect("Failed to receive");

    assert_eq!(received.topic, "orders");
    assert_eq!(received.payload, payload);
    assert_eq!(received.key.as_deref(), Some(&b"b563feb7b2b84b6test"[..]));
    assert_eq!(received.headers, vec![MessageHeader::new("origin", "producer")]);
    assert!(received.timestamp.is_some());
}

#[tokio::test]
#[ignore]
async fn acknowledged_messages_are_not_redelivered() {
    let (_kafka, brokers) = start_kafka().await;
    let orders = sink(&brokers, "acked-orders");
    orders.send(OutboundMessage::new(b"first".to_vec())).await.unwrap();
    orders.send(OutboundMessage::new(b"second".to_vec())).await.unwrap();

    {
        let first_member = source(&brokers, "acked-orders", "ack-group");
        let first = tokio::time::timeout(Duration::from_secs(30), first_member.receive())
            .await
            .expect("Timeout waiting for first message")
            .unwrap();
        assert_eq!(first.payload, b"first");
        first_member.ack(&first).await.unwrap();
        // Async commits are flushed in the background.
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    let second_member = source(&brokers, "acked-orders", "ack-group");
    let next = tokio::time::timeout(Duration::from_secs(30), second_member.receive())
        .await
        .expect("Timeout waiting for second message")
        .unwrap();

    assert_eq!(next.payload, b"second");
}

#[tokio::test]
#[ignore]
async fn unacknowledged_message_is_redelivered_to_the_group() {
    let (_kafka, brokers) = start_kafka().await;
    sink(&brokers, "unacked-orders")
        .send(OutboundMessage::new(b"only".to_vec()))
        .await
        .unwrap();

    {
        let first_member = source(&brokers, "unacked-orders", "redelivery-group");
        let message = tokio::time::timeout(Duration::from_secs(30), first_member.receive())
            .await
            .expect("Timeout waiting for message")
            .unwrap();
        assert_eq!(message.payload, b"only");
    }

    let second_member = source(&brokers, "unacked-orders", "redelivery-group");
    let again = tokio::time::timeout(Duration::from_secs(30), second_member.receive())
        .await
        .expect("Timeout waiting for redelivery")
        .unwrap();

    assert_eq!(again.payload, b"only");
    assert_eq!(again.offset, 0);
}
