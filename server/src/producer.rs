//! Demo producer that feeds the order topic.
//!
//! Every tick publishes one randomly generated, valid Order Record and one
//! empty record that fails validation, so both the happy path and the reject
//! path of the ingestion pipeline see traffic.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use orderstream_core::environment::Clock;
use orderstream_core::message::{MessageHeader, MessageSink, OutboundMessage};
use orderstream_core::{Delivery, Item, OrderHeader, OrderRecord, Payment};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Header naming the kind of record carried (`valid` or `empty`).
pub const KIND_HEADER: &str = "x-order-kind";

/// Counters reported when the producer stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerSummary {
    /// Messages acknowledged by the broker.
    pub published: u64,
    /// Messages the broker did not confirm.
    pub failed: u64,
}

fn alphanumeric<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    rng.sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// A random Order Record that passes validation at any time after `now`.
#[must_use]
pub fn random_order<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> OrderRecord {
    let order_uid = uuid::Builder::from_random_bytes(rng.r#gen())
        .into_uuid()
        .simple()
        .to_string();
    let track_number = alphanumeric(rng, 14).to_uppercase();
    let created = now - ChronoDuration::seconds(rng.gen_range(0..86_400));

    let item_count = rng.gen_range(1..=3);
    let items: Vec<Item> = (0..item_count)
        .map(|_| {
            let price = rng.gen_range(0..=255);
            let sale = rng.gen_range(0..=50);
            Item {
                chrt_id: rng.gen_range(1_000_000..10_000_000),
                track_number: track_number.clone(),
                price,
                rid: alphanumeric(rng, 21).to_lowercase(),
                name: alphanumeric(rng, 10),
                sale,
                size: rng.gen_range(0..5).to_string(),
                total_price: price * (100 - sale) / 100,
                nm_id: rng.gen_range(1_000_000..10_000_000),
                brand: alphanumeric(rng, 8),
                status: 202,
            }
        })
        .collect();
    let goods_total: i64 = items.iter().map(|item| item.total_price).sum();
    let delivery_cost = rng.gen_range(0..=2000);

    OrderRecord {
        order: OrderHeader {
            order_uid: order_uid.clone(),
            track_number,
            entry: "WBIL".to_string(),
            locale: if rng.gen_bool(0.5) { "en" } else { "ru" }.to_string(),
            internal_signature: String::new(),
            customer_id: alphanumeric(rng, 8).to_lowercase(),
            delivery_service: "meest".to_string(),
            shard_key: rng.gen_range(0..10).to_string(),
            sm_id: rng.gen_range(0..100),
            date_created: Some(created),
            oof_shard: rng.gen_range(0..3).to_string(),
        },
        delivery: Delivery {
            name: alphanumeric(rng, 10),
            phone: format!("+972{:07}", rng.gen_range(0..10_000_000)),
            zip: format!("{:07}", rng.gen_range(0..10_000_000)),
            city: alphanumeric(rng, 8),
            address: format!("{} {}", alphanumeric(rng, 10), rng.gen_range(1..200)),
            region: alphanumeric(rng, 6),
            email: format!("{}@example.com", alphanumeric(rng, 8).to_lowercase()),
        },
        payment: Payment {
            transaction: order_uid,
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: goods_total + delivery_cost,
            payment_dt: created.timestamp(),
            bank: "alpha".to_string(),
            delivery_cost,
            goods_total,
            custom_fee: 0,
        },
        items,
    }
}

/// A record with every field empty. It decodes but never validates.
#[must_use]
pub fn empty_order() -> OrderRecord {
    OrderRecord::default()
}

fn encode(record: &OrderRecord, kind: &str) -> Option<OutboundMessage> {
    match record.to_json() {
        Ok(payload) => {
            let mut message =
                OutboundMessage::new(payload).with_header(MessageHeader::new(KIND_HEADER, kind));
            if !record.id().is_empty() {
                message = message.with_key(record.id());
            }
            Some(message)
        }
        Err(e) => {
            tracing::error!(error = %e, kind, "Failed to encode order");
            None
        }
    }
}

async fn publish(
    sink: &dyn MessageSink,
    record: &OrderRecord,
    kind: &str,
    summary: &mut ProducerSummary,
) {
    let Some(message) = encode(record, kind) else {
        return;
    };
    match sink.send(message).await {
        Ok(()) => {
            summary.published += 1;
            tracing::info!(order_id = %record.id(), kind, "Published order");
        }
        Err(e) => {
            summary.failed += 1;
            tracing::warn!(error = %e, kind, "Failed to publish order");
        }
    }
}

/// Publish one valid and one empty record every `interval` until `shutdown`
/// is cancelled.
pub async fn run_producer(
    sink: &dyn MessageSink,
    clock: &dyn Clock,
    interval: Duration,
    shutdown: CancellationToken,
) -> ProducerSummary {
    let mut summary = ProducerSummary::default();

    tracing::info!(topic = %sink.topic(), ?interval, "Order producer started");

    while !shutdown.is_cancelled() {
        let valid = {
            let mut rng = rand::thread_rng();
            random_order(&mut rng, clock.now())
        };
        publish(sink, &valid, "valid", &mut summary).await;
        publish(sink, &empty_order(), "empty", &mut summary).await;

        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!(
        published = summary.published,
        failed = summary.failed,
        "Order producer stopped"
    );
    summary
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use orderstream_core::validation::{ValidationError, validate_at};
    use orderstream_testing::{InMemorySink, test_clock};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;

    #[test]
    fn random_orders_validate() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = test_clock().now();

        for _ in 0..50 {
            let record = random_order(&mut rng, now);
            assert_eq!(validate_at(&record, now), Ok(()));
            assert_eq!(record.payment.transaction, record.id());
            assert!(
                record
                    .items
                    .iter()
                    .all(|item| item.track_number == record.order.track_number)
            );
        }
    }

    #[test]
    fn random_orders_have_distinct_ids() {
        let mut rng = StdRng::seed_from_u64(11);
        let now = test_clock().now();

        let a = random_order(&mut rng, now);
        let b = random_order(&mut rng, now);

        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn empty_order_is_rejected() {
        let result = validate_at(&empty_order(), test_clock().now());

        assert!(matches!(result, Err(ValidationError::MissingFields(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn producer_publishes_a_valid_and_an_empty_record_per_tick() {
        let sink = Arc::new(InMemorySink::new("orders"));
        let shutdown = CancellationToken::new();

        let task = {
            let sink = sink.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                run_producer(
                    sink.as_ref(),
                    &test_clock(),
                    Duration::from_secs(1),
                    shutdown,
                )
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(2500)).await;
        shutdown.cancel();
        let summary = task.await.unwrap();

        let sent = sink.sent();
        assert_eq!(summary.published, 6);
        assert_eq!(sent.len(), 6);
        let kinds: Vec<_> = sent.iter().map(|m| m.header(KIND_HEADER).unwrap()).collect();
        assert_eq!(kinds, [&b"valid"[..], &b"empty"[..]].repeat(3));

        let first = OrderRecord::from_json(&sent[0].payload).unwrap();
        assert_eq!(sent[0].key.as_deref(), Some(first.id().as_bytes()));
        assert_eq!(sent[1].key, None);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_sends_are_counted_and_the_loop_continues() {
        let sink = Arc::new(InMemorySink::new("orders"));
        sink.fail_sends(1);
        let shutdown = CancellationToken::new();

        let task = {
            let sink = sink.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                run_producer(sink.as_ref(), &test_clock(), Duration::from_secs(1), shutdown).await
            })
        };

        tokio::time::sleep(Duration::from_millis(500)).await;
        shutdown.cancel();
        let summary = task.await.unwrap();

        assert_eq!(
            summary,
            ProducerSummary {
                published: 1,
                failed: 1
            }
        );
        assert_eq!(sink.sent()[0].header(KIND_HEADER), Some(&b"empty"[..]));
    }
}
