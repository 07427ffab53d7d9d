//! Cache statistics endpoint
//!
//! GET /api/cache/stats — today's counter bucket plus the live entry count.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;

use crate::models::api::ErrorResponse;
use crate::services::store::CacheStatsBucket;
use crate::AppState;

use super::internal_error;

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub entries: u64,
    pub today: Option<CacheStatsBucket>,
}

pub async fn get_cache_stats(
    State(state): State<AppState>,
) -> Result<Json<CacheStatsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let today = state
        .store
        .get_cache_stats(Utc::now().date_naive())
        .await
        .map_err(|e| {
            tracing::error!("cache stats query failed: {}", e);
            internal_error("durable store unavailable".to_string())
        })?;

    Ok(Json(CacheStatsResponse {
        entries: state.cache.entry_count(),
        today,
    }))
}
