//! Historical backfill processor
//!
//! Shared by the batch-processing worker and the daily historical-fetch job:
//! both feed it a (token, network, start, end) range and it fills every
//! missing UTC-midnight observation in between. The exists-check before any
//! external work makes re-runs and duplicate enqueues free.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::models::price::Network;
use crate::services::oracle::{OracleClient, PriceRequest};
use crate::services::store::PriceStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: usize,
    pub errors: usize,
    pub skipped: usize,
}

/// Inclusive series of UTC midnights from `start`'s day through `end`'s day.
pub fn daily_series(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut series = Vec::new();
    let mut day = start.date_naive();
    let last = end.date_naive();
    while day <= last {
        if let Some(midnight) = day.and_hms_opt(0, 0, 0) {
            series.push(Utc.from_utc_datetime(&midnight));
        }
        day += Duration::days(1);
    }
    series
}

pub struct HistoricalBackfill {
    store: Arc<dyn PriceStore>,
    oracle: Arc<OracleClient>,
}

impl HistoricalBackfill {
    pub fn new(store: Arc<dyn PriceStore>, oracle: Arc<OracleClient>) -> Self {
        Self { store, oracle }
    }

    pub async fn process_batch_historical(
        &self,
        token: &str,
        network: Network,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BatchReport, Box<dyn std::error::Error + Send + Sync>> {
        let series = daily_series(start, end);
        let mut report = BatchReport::default();

        // Idempotence: existing rows are skipped before any oracle call.
        let mut missing = Vec::new();
        for timestamp in series {
            match self.store.get_price(token, network, Some(timestamp)).await? {
                Some(_) => report.skipped += 1,
                None => missing.push(timestamp),
            }
        }

        if missing.is_empty() {
            tracing::info!(
                token = %token,
                network = %network,
                skipped = report.skipped,
                "historical batch already complete"
            );
            return Ok(report);
        }

        let requests: Vec<PriceRequest> = missing
            .iter()
            .map(|ts| PriceRequest {
                token: token.to_string(),
                network,
                timestamp: Some(*ts),
            })
            .collect();

        let results = self.oracle.batch_get_prices(&requests).await;

        for (timestamp, result) in missing.iter().zip(results) {
            match result {
                Some(record) => match self.store.store_price(&record).await {
                    Ok(()) => report.processed += 1,
                    Err(e) => {
                        tracing::warn!(
                            token = %token,
                            timestamp = %timestamp,
                            "failed to store backfilled price: {}",
                            e
                        );
                        report.errors += 1;
                    }
                },
                None => report.errors += 1,
            }
        }

        tracing::info!(
            token = %token,
            network = %network,
            processed = report.processed,
            skipped = report.skipped,
            errors = report.errors,
            "historical batch complete"
        );

        Ok(report)
    }
}
