pub mod batch;
pub mod cache_stats;
pub mod health;
pub mod history;
pub mod price;
pub mod queue;

use axum::http::StatusCode;
use axum::Json;

use crate::models::api::ErrorResponse;
use crate::models::price::{Network, TokenAddress};
use crate::AppState;

type Rejection = (StatusCode, Json<ErrorResponse>);

pub(crate) fn bad_request(message: String) -> Rejection {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message }))
}

pub(crate) fn internal_error(message: String) -> Rejection {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: message }),
    )
}

/// Surface-level validation: token shape and network membership. Deeper
/// layers assume validated inputs.
pub(crate) fn validate_token_network(
    state: &AppState,
    token: &str,
    network: &str,
) -> Result<(TokenAddress, Network), Rejection> {
    let token = TokenAddress::parse(token).map_err(bad_request)?;
    let network = network.parse::<Network>().map_err(bad_request)?;
    if !state.config.supported_networks.contains(&network) {
        return Err(bad_request(format!("unsupported network: {}", network)));
    }
    Ok((token, network))
}
