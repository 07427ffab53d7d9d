//! Health endpoint
//!
//! GET /health — 200 when every dependency is reachable, 503 otherwise.

use axum::{extract::State, http::StatusCode, Json};

use crate::models::api::{HealthResponse, HealthServices};
use crate::AppState;

pub async fn get_health(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let database = state.store.ping().await.is_ok();
    // The cache is in-process; reachable as long as we are.
    let cache = true;
    let oracle = state.oracle_configured;
    let queues = state.price_queue.is_running() && state.batch_queue.is_running();

    let healthy = database && cache && oracle && queues;
    let status = if healthy { "ok" } else { "degraded" };
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            services: HealthServices {
                database,
                cache,
                oracle,
                queues,
            },
        }),
    )
}
