//! Stored price history endpoint
//!
//! GET /api/tokens/{token}/history?network=ethereum&start=...&end=...
//! Defaults to the last 30 days when no range is given.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use tracing::info;

use crate::models::api::{ErrorResponse, HistoryQuery, HistoryResponse};
use crate::models::price::parse_timestamp;
use crate::AppState;

use super::{bad_request, internal_error, validate_token_network};

pub async fn get_price_history(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, (StatusCode, Json<ErrorResponse>)> {
    let (token, network) = validate_token_network(&state, &token, &query.network)?;

    let end = match &query.end {
        Some(raw) => parse_timestamp(raw).map_err(bad_request)?,
        None => Utc::now(),
    };
    let start = match &query.start {
        Some(raw) => parse_timestamp(raw).map_err(bad_request)?,
        None => end - Duration::days(30),
    };
    if start > end {
        return Err(bad_request(format!(
            "start {} is after end {}",
            start, end
        )));
    }

    let data = state
        .store
        .get_price_history(token.as_str(), network, start, end)
        .await
        .map_err(|e| {
            tracing::error!("history query failed: {}", e);
            internal_error("durable store unavailable".to_string())
        })?;

    info!(token = %token, network = %network, count = data.len(), "price history served");

    Ok(Json(HistoryResponse {
        success: true,
        token: token.as_str().to_string(),
        network: network.to_string(),
        count: data.len(),
        data,
    }))
}
