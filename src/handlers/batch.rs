//! Historical batch endpoint
//!
//! POST /api/batch/historical — enqueues a backfill for every UTC day in
//! [startDate, endDate].

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tracing::info;

use crate::models::api::{BatchHistoricalRequest, BatchHistoricalResponse, ErrorResponse};
use crate::models::price::parse_timestamp;
use crate::services::queue::{BatchJob, PRIORITY_HISTORICAL};
use crate::AppState;

use super::{bad_request, validate_token_network};

/// Accepts either a full RFC-3339 timestamp or a bare YYYY-MM-DD date.
fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = parse_timestamp(raw) {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).expect("midnight exists")))
        .map_err(|e| format!("invalid date '{}': {}", raw, e))
}

pub async fn enqueue_batch_historical(
    State(state): State<AppState>,
    Json(request): Json<BatchHistoricalRequest>,
) -> Result<Json<BatchHistoricalResponse>, (StatusCode, Json<ErrorResponse>)> {
    let (token, network) = validate_token_network(&state, &request.token, &request.network)?;

    let start_date = parse_date(&request.start_date).map_err(bad_request)?;
    let end_date = parse_date(&request.end_date).map_err(bad_request)?;
    if start_date > end_date {
        return Err(bad_request(format!(
            "startDate {} is after endDate {}",
            request.start_date, request.end_date
        )));
    }

    let request_id = format!(
        "batch-{}-{}-{}",
        network,
        token,
        start_date.date_naive()
    );
    let job_id = state.batch_queue.enqueue(
        BatchJob {
            token: token.as_str().to_string(),
            network,
            start_date,
            end_date,
            request_id,
        },
        PRIORITY_HISTORICAL,
    );

    info!(token = %token, network = %network, job_id = %job_id, "batch historical job enqueued");

    Ok(Json(BatchHistoricalResponse {
        success: true,
        job_id,
    }))
}
