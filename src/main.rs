use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod domain;
mod messaging;
mod metrics;
mod models;
mod outbox;
mod store;
mod utils;

use config::AppConfig;
use messaging::{EventPublisher, KafkaEventPublisher};
use outbox::{OutboxCoordinator, OutboxSweeper, SweepConfig};
use store::{OrderStore, ScyllaOrderStore};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_outbox=debug")),
        )
        .init();

    tracing::info!("🚀 Starting order ingestion service");

    let config = AppConfig::from_env();
    tracing::debug!(?config, "Loaded configuration");

    // === 1. Create ScyllaDB Session ===
    tracing::info!(node = %config.scylla_node, "Connecting to ScyllaDB...");
    let session: Session = SessionBuilder::new()
        .known_node(&config.scylla_node)
        .build()
        .await?;

    session
        .query_unpaged(
            format!(
                "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                 {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                config.keyspace
            ),
            &[],
        )
        .await?;

    session.use_keyspace(config.keyspace.as_str(), false).await?;

    let session = Arc::new(session);
    let store: Arc<dyn OrderStore> = Arc::new(ScyllaOrderStore::init(session).await?);

    // === 2. Initialize Prometheus metrics ===
    tracing::info!("Initializing metrics");
    let metrics = Arc::new(metrics::Metrics::new()?);

    // Start metrics HTTP server in background thread
    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().expect("Failed to build metrics runtime");
        rt.block_on(async {
            if let Err(e) = metrics::start_metrics_server(metrics_registry, metrics_port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    // === 3. Create Kafka publisher and probe readiness ===
    let publisher = Arc::new(KafkaEventPublisher::new(
        &config.kafka_brokers,
        config.publish_timeout,
    )?);

    // Publishes fail fast with NotReady until the probe succeeds; orders
    // keep flowing into the store and the sweeper delivers the backlog.
    let probe = publisher.clone();
    tokio::spawn(async move {
        loop {
            match probe.wait_ready(std::time::Duration::from_secs(5)).await {
                Ok(()) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "Kafka not reachable yet, retrying");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                }
            }
        }
    });

    let publisher: Arc<dyn EventPublisher> = publisher;

    // === 4. Start the outbox sweeper ===
    let sweeper = Arc::new(OutboxSweeper::new(
        store.clone(),
        publisher.clone(),
        metrics.clone(),
        SweepConfig {
            poll_interval: config.sweep_poll_interval,
            max_attempts: config.sweep_max_attempts,
            ..SweepConfig::default()
        },
    ));
    sweeper.start();

    // === 5. Serve the ingestion API ===
    let coordinator = OutboxCoordinator::new(store.clone(), publisher, metrics);
    api::serve(
        api::ApiState { coordinator, store },
        &config.http_host,
        config.http_port,
    )
    .await?;

    Ok(())
}
