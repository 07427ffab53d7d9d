// src/lib.rs

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::config::Config;
use crate::services::cache::PriceCache;
use crate::services::oracle::OracleClient;
use crate::services::queue::{BatchJob, JobQueue, PriceJob};
use crate::services::resolver::PriceResolver;
use crate::services::store::PriceStore;

pub mod config;
pub mod errors;
pub mod handlers;
pub mod jobs;
pub mod models;

pub mod entities {
    pub mod prelude;

    pub mod archived_prices;
    pub mod cache_stats;
    pub mod daily_rollups;
    pub mod prices;
    pub mod tokens;
}

pub mod services {
    pub mod backfill;
    pub mod cache;
    pub mod interpolation;
    pub mod oracle;
    pub mod queue;
    pub mod resolver;
    pub mod sql_store;
    pub mod store;
    pub mod workers;
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn PriceStore>,
    pub cache: Arc<PriceCache>,
    pub oracle: Arc<OracleClient>,
    pub resolver: Arc<PriceResolver>,
    pub price_queue: JobQueue<PriceJob>,
    pub batch_queue: JobQueue<BatchJob>,
    pub oracle_configured: bool,
}

/// The full API surface; shared between `main` and the integration tests.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/tokens", post(handlers::price::resolve_price))
        .route(
            "/api/batch/historical",
            post(handlers::batch::enqueue_batch_historical),
        )
        .route("/api/queue/status", get(handlers::queue::get_queue_status))
        .route(
            "/api/tokens/{token}/history",
            get(handlers::history::get_price_history),
        )
        .route("/api/cache/stats", get(handlers::cache_stats::get_cache_stats))
        .route("/health", get(handlers::health::get_health))
        .with_state(state)
}
