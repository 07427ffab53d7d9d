use std::env;
use std::sync::Arc;
use std::time::Duration;

use migration::MigratorTrait;
use sea_orm::Database;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pricefeed_backend::config::Config;
use pricefeed_backend::jobs::{
    cache_warming, daily_historical_fetch, data_archival, maintenance, metrics_collection,
};
use pricefeed_backend::services::backfill::HistoricalBackfill;
use pricefeed_backend::services::cache::PriceCache;
use pricefeed_backend::services::interpolation::InterpolationEngine;
use pricefeed_backend::services::oracle::{AlchemyPriceSource, OracleClient};
use pricefeed_backend::services::queue::{BatchJob, JobQueue, PriceJob};
use pricefeed_backend::services::resolver::PriceResolver;
use pricefeed_backend::services::sql_store::SqlPriceStore;
use pricefeed_backend::services::store::PriceStore;
use pricefeed_backend::services::workers::{BatchJobWorker, PriceJobWorker};
use pricefeed_backend::{api_router, AppState};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pricefeed_backend=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Arc::new(Config::from_env());

    // Connect to database
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    // Owned collaborators, constructed once and shared by Arc
    let store: Arc<dyn PriceStore> = Arc::new(SqlPriceStore::new(db.clone()));

    let cache = Arc::new(PriceCache::new(&config.app_name, &config.cache));
    cache.set_stats_sink(store.clone());

    let api_key = env::var("ALCHEMY_API_KEY").expect("ALCHEMY_API_KEY must be set");
    let source = Arc::new(AlchemyPriceSource::new(api_key, config.oracle.timeout_secs));
    let oracle = Arc::new(OracleClient::new(source, &config.oracle));

    let interpolator = Arc::new(InterpolationEngine::new(
        store.clone(),
        config.interpolation.clone(),
    ));

    let price_queue: JobQueue<PriceJob> = JobQueue::new(
        "price-processing",
        config.queue.max_attempts,
        config.queue.backoff_base_ms,
    );
    let batch_queue: JobQueue<BatchJob> = JobQueue::new(
        "batch-processing",
        config.queue.max_attempts,
        config.queue.backoff_base_ms,
    );

    let backfill = Arc::new(HistoricalBackfill::new(store.clone(), oracle.clone()));

    price_queue.start_workers(
        config.queue.price_concurrency,
        Arc::new(PriceJobWorker {
            store: store.clone(),
            cache: cache.clone(),
            oracle: oracle.clone(),
            interpolator: interpolator.clone(),
        }),
    );
    batch_queue.start_workers(
        config.queue.batch_concurrency,
        Arc::new(BatchJobWorker {
            backfill: backfill.clone(),
        }),
    );

    let resolver = Arc::new(PriceResolver::new(
        cache.clone(),
        store.clone(),
        oracle.clone(),
        interpolator.clone(),
        price_queue.clone(),
    ));

    // Background lifecycle jobs
    data_archival::start_data_archival_job(
        store.clone(),
        config.retention.clone(),
        config.schedules.archival_interval_secs,
    )
    .await;

    if config.schedules.cache_warming_enabled {
        cache_warming::start_cache_warming_job(
            cache.clone(),
            oracle.clone(),
            config.popular_tokens.clone(),
            config.schedules.cache_warming_interval_secs,
        )
        .await;
    }

    if config.schedules.metrics_enabled {
        metrics_collection::start_metrics_collection_job(
            store.clone(),
            config.schedules.metrics_interval_secs,
        )
        .await;
    }

    daily_historical_fetch::start_daily_historical_fetch_job(
        store.clone(),
        oracle.clone(),
        batch_queue.clone(),
        config.schedules.historical_fetch_interval_secs,
    )
    .await;

    maintenance::start_maintenance_jobs(cache.clone(), config.schedules.clone()).await;

    let state = AppState {
        config: config.clone(),
        store,
        cache,
        oracle,
        resolver,
        price_queue: price_queue.clone(),
        batch_queue: batch_queue.clone(),
        oracle_configured: true,
    };

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api_router(state).layer(cors);

    // Start server
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .unwrap();

    tracing::info!("Server listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    // Drain background work before dropping the store connection.
    tracing::info!("Shutting down: draining queues");
    price_queue.close();
    batch_queue.close();
    price_queue.drain(Duration::from_secs(30)).await;
    batch_queue.drain(Duration::from_secs(30)).await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
