use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use orderflow::clients::{HttpCatalogClient, ResilientCatalogClient};
use orderflow::config::AppConfig;
use orderflow::domain::order::{OrderService, OrderValidator};
use orderflow::jobs::{self, JobConfig, PROCESS_NEW_ORDERS_LOCK, PUBLISH_ORDER_EVENTS_LOCK};
use orderflow::lock::PostgresLockProvider;
use orderflow::messaging::KafkaEventPublisher;
use orderflow::metrics::{self, Metrics};
use orderflow::outbox::Dispatcher;
use orderflow::store::{OrderStore, PostgresOrderStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging with environment-based filtering; override the
    // default with RUST_LOG, e.g. RUST_LOG=debug
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,orderflow=debug")),
        )
        .init();

    let config = AppConfig::from_env();
    tracing::info!("Starting orderflow order orchestration service");

    // === 1. Database ===
    tracing::info!("Connecting to Postgres");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    let store = Arc::new(PostgresOrderStore::new(pool.clone()));
    store.ensure_schema().await?;
    let store: Arc<dyn OrderStore> = store;

    // === 2. Metrics registry + scrape server on its own runtime ===
    let metrics = Arc::new(Metrics::new()?);
    let registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().expect("metrics runtime");
        rt.block_on(async {
            if let Err(e) = metrics::start_metrics_server(registry, metrics_port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    // === 3. Resilient catalog client + validator + lifecycle engine ===
    let http_catalog = Arc::new(HttpCatalogClient::new(&config.catalog_base_url)?);
    let catalog = Arc::new(ResilientCatalogClient::new(
        http_catalog,
        config.breaker.clone(),
        config.retry.clone(),
        metrics.clone(),
    ));
    let validator = OrderValidator::new(catalog);
    let service = Arc::new(OrderService::new(store.clone(), validator, metrics.clone()));

    // === 4. Outbox dispatcher over Kafka ===
    let publisher = Arc::new(KafkaEventPublisher::new(
        &config.kafka_brokers,
        config.topics.clone(),
    )?);
    let dispatcher = Arc::new(Dispatcher::new(store.clone(), publisher, metrics.clone()));

    // === 5. Scheduled jobs behind the distributed lock ===
    let lock = Arc::new(PostgresLockProvider::new(pool.clone()));

    let advancement = jobs::spawn_periodic(
        JobConfig {
            name: PROCESS_NEW_ORDERS_LOCK,
            period: config.new_orders_job_period,
            max_hold: config.job_max_hold,
        },
        lock.clone(),
        metrics.clone(),
        {
            let service = service.clone();
            move || {
                let service = service.clone();
                async move {
                    service.process_new_orders().await?;
                    Ok(())
                }
            }
        },
    );

    let dispatch = jobs::spawn_periodic(
        JobConfig {
            name: PUBLISH_ORDER_EVENTS_LOCK,
            period: config.publish_events_job_period,
            max_hold: config.job_max_hold,
        },
        lock.clone(),
        metrics.clone(),
        {
            let dispatcher = dispatcher.clone();
            move || {
                let dispatcher = dispatcher.clone();
                async move {
                    dispatcher.publish_pending().await?;
                    Ok(())
                }
            }
        },
    );

    tracing::info!("orderflow running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    advancement.abort();
    dispatch.abort();
    tracing::info!("Shutting down");

    Ok(())
}
