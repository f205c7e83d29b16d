//! Application bootstrap and lifecycle management.
//!
//! [`Application`] owns every long-lived part of the service and coordinates
//! their lifecycle:
//!
//! 1. **Startup** ([`Application::build`]): connect the Record Store (fatal on
//!    failure), run migrations (fatal), connect the broker, assemble the
//!    retrying wrapper, cache, query service and ingestion pipeline, then warm
//!    the cache (a failure is logged and startup continues)
//! 2. **Runtime** ([`Application::run`]): cache sweeper, ingestion consumer and
//!    HTTP server run as background tasks
//! 3. **Shutdown**: on SIGINT/SIGTERM the process token is cancelled; the HTTP
//!    server stops accepting, the consumer finishes its in-flight message and
//!    stops. All tasks share one grace period; any task still running when it
//!    expires is aborted
//!
//! # Example
//!
//! ```rust,ignore
//! let config = Config::from_env();
//! let app = Application::build(config, Some(Metrics::install()?)).await?;
//! app.run().await?;
//! ```

use crate::config::Config;
use anyhow::Context as _;
use orderstream_core::CallContext;
use orderstream_core::cache::OrderCache;
use orderstream_core::message::{MessageSink, MessageSource};
use orderstream_core::repository::OrderRepository;
use orderstream_postgres::PostgresOrderRepository;
use orderstream_redpanda::{RedpandaSink, RedpandaSource};
use orderstream_runtime::metrics::Metrics;
use orderstream_runtime::{
    IngestionPipeline, OrderQueryService, PipelineConfig, RetryingRepository, TtlOrderCache,
};
use orderstream_web::{AppState, CorsLayer, router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Fully wired service, ready to run.
pub struct Application {
    config: Config,
    listener: TcpListener,
    app: axum::Router,
    cache: Arc<TtlOrderCache>,
    pipeline: Arc<IngestionPipeline>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("bind_address", &self.config.bind_address())
            .field("cached_orders", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl Application {
    /// Connect to PostgreSQL and Redpanda, then assemble the service.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The database connection fails
    /// - Database migrations fail
    /// - The broker client cannot be created
    /// - The HTTP listener cannot bind
    pub async fn build(config: Config, metrics: Option<Metrics>) -> anyhow::Result<Self> {
        info!("Connecting to Record Store database...");
        let store = PostgresOrderRepository::connect(
            &config.postgres.url,
            config.postgres.max_connections,
        )
        .await
        .context("failed to connect to PostgreSQL")?;

        info!("Running database migrations...");
        store
            .migrate()
            .await
            .context("failed to run database migrations")?;

        info!("Connecting to Redpanda...");
        let source = RedpandaSource::builder()
            .brokers(&config.redpanda.brokers)
            .topic(&config.redpanda.orders_topic)
            .consumer_group(&config.redpanda.consumer_group)
            .auto_offset_reset(&config.redpanda.auto_offset_reset)
            .build()
            .context("failed to create order consumer")?;
        let dead_letters = RedpandaSink::builder()
            .brokers(&config.redpanda.brokers)
            .topic(&config.redpanda.dead_letter_topic)
            .producer_acks(&config.redpanda.producer_acks)
            .build()
            .context("failed to create dead-letter producer")?;

        Self::assemble(
            config,
            Arc::new(store),
            Arc::new(source),
            Arc::new(dead_letters),
            metrics,
        )
        .await
    }

    /// Assemble the service over already-connected infrastructure.
    ///
    /// Binds the HTTP listener and warms the cache. A warm-up failure is
    /// logged; entries loaded before it stay in the cache.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP listener cannot bind or the CORS origin is
    /// not a valid header value.
    pub async fn assemble(
        config: Config,
        repository: Arc<dyn OrderRepository>,
        source: Arc<dyn MessageSource>,
        dead_letters: Arc<dyn MessageSink>,
        metrics: Option<Metrics>,
    ) -> anyhow::Result<Self> {
        let shutdown = CancellationToken::new();

        let persistence = Arc::new(RetryingRepository::new(repository));
        let cache = Arc::new(
            TtlOrderCache::builder()
                .ttl(Duration::from_secs(config.cache.ttl))
                .warm_up_window_days(config.cache.warm_up_days)
                .fetch_timeout(Duration::from_secs(config.cache.fetch_timeout))
                .build(),
        );
        let queries = Arc::new(
            OrderQueryService::new(cache.clone(), persistence.clone())
                .with_lookup_timeout(Duration::from_secs(config.server.lookup_timeout)),
        );
        let pipeline = Arc::new(
            IngestionPipeline::new(source, dead_letters, persistence.clone(), cache.clone())
                .with_config(PipelineConfig {
                    max_attempts: config.ingest.max_attempts,
                    attempt_backoff: Duration::from_millis(config.ingest.attempt_backoff_ms),
                    dead_letter_invalid: config.ingest.dead_letter_invalid,
                    receive_error_backoff: Duration::from_millis(
                        config.ingest.receive_error_backoff_ms,
                    ),
                }),
        );

        let mut state = AppState::new(queries);
        if let Some(metrics) = metrics {
            state = state.with_metrics(metrics);
        }
        let cors = CorsLayer::new(&config.server.cors_origin)
            .with_context(|| format!("invalid CORS origin '{}'", config.server.cors_origin))?;
        let app = router(state, cors);

        let listener = TcpListener::bind(config.bind_address())
            .await
            .with_context(|| format!("failed to bind {}", config.bind_address()))?;

        let warm_up_ctx = CallContext::new(shutdown.clone());
        match cache.warm_up(&warm_up_ctx, &*persistence).await {
            Ok(loaded) => info!(loaded, "Order cache warmed up"),
            Err(e) => warn!(
                error = %e,
                loaded = cache.len(),
                "Cache warm-up failed, continuing with partial cache"
            ),
        }

        Ok(Self {
            config,
            listener,
            app,
            cache,
            pipeline,
            shutdown,
        })
    }

    /// Address the HTTP server is listening on.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from the underlying socket.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The shared order cache.
    #[must_use]
    pub fn cache(&self) -> Arc<TtlOrderCache> {
        self.cache.clone()
    }

    /// Run until SIGINT or SIGTERM, then shut down gracefully.
    ///
    /// # Errors
    ///
    /// Currently infallible once assembled; the `Result` leaves room for
    /// startup steps that may fail inside `run`.
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `signal` resolves, then shut down gracefully.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub async fn run_until(self, signal: impl Future<Output = ()> + Send) -> anyhow::Result<()> {
        let Self {
            config,
            listener,
            app,
            cache,
            pipeline,
            shutdown,
        } = self;

        info!("Starting cache sweeper");
        let sweeper = cache.spawn_sweeper(
            Duration::from_millis(config.cache.sweep_interval_ms),
            shutdown.clone(),
        );

        info!(topic = %config.redpanda.orders_topic, "Starting ingestion consumer");
        let consumer_token = shutdown.clone();
        let consumer = tokio::spawn(async move {
            let summary = pipeline.run(consumer_token).await;
            info!(?summary, "Ingestion consumer stopped");
        });

        info!(address = %config.bind_address(), "Starting HTTP server");
        let server_token = shutdown.clone();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_token.cancelled().await })
                .await;
            match result {
                Ok(()) => info!("HTTP server stopped"),
                Err(e) => error!(error = %e, "HTTP server failed"),
            }
        });

        signal.await;
        info!("Shutdown signal received, initiating graceful shutdown...");
        shutdown.cancel();

        let deadline = Instant::now() + config.shutdown_timeout();
        await_task("http_server", server, deadline).await;
        await_task("ingestion_consumer", consumer, deadline).await;
        await_task("cache_sweeper", sweeper, deadline).await;

        info!("Graceful shutdown complete");
        Ok(())
    }
}

/// Wait for a background task until `deadline`, then abort it.
async fn await_task(name: &'static str, mut handle: JoinHandle<()>, deadline: Instant) {
    match tokio::time::timeout_at(deadline, &mut handle).await {
        Ok(Ok(())) => info!(task = name, "Task stopped gracefully"),
        Ok(Err(e)) => warn!(task = name, error = %e, "Task failed"),
        Err(_) => {
            warn!(task = name, "Task shutdown timed out, aborting");
            handle.abort();
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// If a handler cannot be installed the error is logged and that signal is
/// ignored; the other one still works.
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
