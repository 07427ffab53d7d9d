//! Queue status endpoint
//!
//! GET /api/queue/status

use axum::{extract::State, Json};

use crate::models::api::QueueStatusResponse;
use crate::AppState;

pub async fn get_queue_status(State(state): State<AppState>) -> Json<QueueStatusResponse> {
    Json(QueueStatusResponse {
        price_queue: state.price_queue.counts(),
        batch_queue: state.batch_queue.counts(),
    })
}
