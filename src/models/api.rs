//! Request and response shapes for the HTTP surface

use serde::{Deserialize, Serialize};

use crate::models::price::PriceRecord;
use crate::services::queue::JobCounts;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvePriceRequest {
    pub token: String,
    pub network: String,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PriceRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchHistoricalRequest {
    pub token: String,
    pub network: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchHistoricalResponse {
    pub success: bool,
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatusResponse {
    pub price_queue: JobCounts,
    pub batch_queue: JobCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthServices {
    pub database: bool,
    pub cache: bool,
    pub oracle: bool,
    pub queues: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub services: HealthServices,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub network: String,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub token: String,
    pub network: String,
    pub count: usize,
    pub data: Vec<PriceRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
