//! Order service HTTP server and ingestion consumer.

use orderstream_runtime::metrics::Metrics;
use orderstream_server::telemetry::init_tracing;
use orderstream_server::{Application, Config};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env();
    init_tracing(&config.server.log_level);

    info!("Starting order service");
    info!(
        postgres_max_connections = config.postgres.max_connections,
        redpanda_brokers = %config.redpanda.brokers,
        orders_topic = %config.redpanda.orders_topic,
        dead_letter_topic = %config.redpanda.dead_letter_topic,
        bind_address = %config.bind_address(),
        "Configuration loaded"
    );

    let metrics = match Metrics::install() {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            warn!(error = %e, "Prometheus recorder unavailable, /metrics disabled");
            None
        }
    };

    let app = Application::build(config, metrics).await?;
    app.run().await?;

    info!("Order service stopped");
    Ok(())
}
