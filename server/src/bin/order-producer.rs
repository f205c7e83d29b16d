//! Demo producer: publishes a valid and an empty order to the order topic
//! once per interval until Ctrl+C or SIGTERM.

use anyhow::Context as _;
use orderstream_core::environment::SystemClock;
use orderstream_redpanda::RedpandaSink;
use orderstream_server::producer::run_producer;
use orderstream_server::telemetry::init_tracing;
use orderstream_server::{Config, shutdown_signal};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env();
    init_tracing(&config.server.log_level);

    let sink = RedpandaSink::builder()
        .brokers(&config.redpanda.brokers)
        .topic(&config.redpanda.orders_topic)
        .producer_acks(&config.redpanda.producer_acks)
        .build()
        .context("failed to create order producer")?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let summary = run_producer(
        &sink,
        &SystemClock,
        Duration::from_millis(config.producer.interval_ms),
        shutdown,
    )
    .await;

    info!(
        published = summary.published,
        failed = summary.failed,
        "Producer finished"
    );
    Ok(())
}
