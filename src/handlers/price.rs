//! Price resolution endpoint
//!
//! POST /api/tokens
//!
//! # Response
//! - 200: resolved record with provenance tag
//! - 202: no synchronous tier had data; a fill job is queued
//! - 400: malformed token, unsupported network, unparseable timestamp
//! - 500: durable store unreachable

use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use crate::errors::ResolveError;
use crate::models::api::{ErrorResponse, PriceResponse, ResolvePriceRequest};
use crate::models::price::parse_timestamp;
use crate::services::resolver::Resolution;
use crate::AppState;

use super::{bad_request, internal_error, validate_token_network};

pub async fn resolve_price(
    State(state): State<AppState>,
    Json(request): Json<ResolvePriceRequest>,
) -> Result<(StatusCode, Json<PriceResponse>), (StatusCode, Json<ErrorResponse>)> {
    let (token, network) = validate_token_network(&state, &request.token, &request.network)?;

    let timestamp = match &request.timestamp {
        Some(raw) => Some(parse_timestamp(raw).map_err(bad_request)?),
        None => None,
    };

    info!(token = %token, network = %network, timestamp = ?timestamp, "price resolution request");

    match state.resolver.resolve(&token, network, timestamp).await {
        Ok(Resolution::Found(record)) => Ok((
            StatusCode::OK,
            Json(PriceResponse {
                success: true,
                message: "price resolved".to_string(),
                data: Some(record),
                queued: None,
            }),
        )),
        Ok(Resolution::Queued { job_id }) => Ok((
            StatusCode::ACCEPTED,
            Json(PriceResponse {
                success: true,
                message: format!("no data available yet, fetch queued as {}", job_id),
                data: None,
                queued: Some(true),
            }),
        )),
        Err(ResolveError::Validation(message)) => Err(bad_request(message)),
        Err(ResolveError::Store(e)) => {
            tracing::error!("store failure during resolution: {}", e);
            Err(internal_error("durable store unavailable".to_string()))
        }
    }
}
