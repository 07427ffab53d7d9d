//! Queue worker handlers
//!
//! Workers are the sole writers of records obtained asynchronously. Each one
//! checks the durable store before doing external work so retries and
//! duplicate enqueues stay safe.

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::price::Network;
use crate::services::backfill::HistoricalBackfill;
use crate::services::cache::{CacheStrategy, PriceCache};
use crate::services::interpolation::InterpolationEngine;
use crate::services::oracle::OracleClient;
use crate::services::queue::{BatchJob, JobHandler, JobOutcome, PriceJob};
use crate::services::store::PriceStore;

/// Best-effort registration of a newly seen token: discover its creation
/// date via the oracle and persist the registry row. Failures are logged,
/// never propagated.
pub async fn register_token_if_new(
    store: Arc<dyn PriceStore>,
    oracle: Arc<OracleClient>,
    token: String,
    network: Network,
) {
    match store.get_token(&token, network).await {
        Ok(Some(_)) => return,
        Ok(None) => {}
        Err(e) => {
            tracing::debug!(token = %token, "token registry lookup failed: {}", e);
            return;
        }
    }

    let creation_date = match oracle.get_token_creation_date(&token, network).await {
        Ok(date) => date,
        Err(e) => {
            tracing::debug!(token = %token, "creation date discovery failed: {}", e);
            None
        }
    };

    if let Err(e) = store.add_token(&token, network, creation_date).await {
        tracing::warn!(token = %token, "failed to register token: {}", e);
    } else {
        tracing::info!(
            token = %token,
            network = %network,
            creation_date = ?creation_date,
            "registered new token"
        );
    }
}

/// Worker for the price-processing queue: oracle with retry, then
/// interpolation, then no-data.
pub struct PriceJobWorker {
    pub store: Arc<dyn PriceStore>,
    pub cache: Arc<PriceCache>,
    pub oracle: Arc<OracleClient>,
    pub interpolator: Arc<InterpolationEngine>,
}

#[async_trait]
impl JobHandler<PriceJob> for PriceJobWorker {
    async fn handle(
        &self,
        payload: &PriceJob,
    ) -> Result<JobOutcome, Box<dyn std::error::Error + Send + Sync>> {
        // Idempotence check before any external work.
        if let Some(timestamp) = payload.timestamp {
            if self
                .store
                .get_price(&payload.token, payload.network, Some(timestamp))
                .await?
                .is_some()
            {
                return Ok(JobOutcome::Skipped);
            }
        }

        let key =
            self.cache
                .price_key(payload.network, &payload.token, payload.timestamp);

        match self
            .oracle
            .get_price_with_retry(&payload.token, payload.network, payload.timestamp)
            .await
        {
            Ok(Some(record)) => {
                self.store.store_price(&record).await?;
                let strategy = if payload.timestamp.is_some() {
                    CacheStrategy::Warm
                } else {
                    CacheStrategy::Hot
                };
                self.cache.set(&key, record.clone(), strategy).await;
                tokio::spawn(register_token_if_new(
                    self.store.clone(),
                    self.oracle.clone(),
                    payload.token.clone(),
                    payload.network,
                ));
                return Ok(JobOutcome::Completed);
            }
            Ok(None) => {}
            Err(e) if e.is_transient() => {
                // Let the queue's own retry/backoff machinery have it.
                return Err(Box::new(e));
            }
            Err(e) => {
                tracing::debug!(token = %payload.token, "oracle definitive miss: {}", e);
            }
        }

        let target = payload.timestamp.unwrap_or_else(chrono::Utc::now);
        if let Some(record) = self
            .interpolator
            .interpolate(&payload.token, payload.network, target)
            .await?
        {
            self.store.store_price(&record).await?;
            self.cache
                .set(&key, record, CacheStrategy::Interpolated)
                .await;
            return Ok(JobOutcome::Completed);
        }

        tracing::info!(
            token = %payload.token,
            network = %payload.network,
            timestamp = ?payload.timestamp,
            "no data obtainable for deferred price fill"
        );
        Ok(JobOutcome::NoData)
    }
}

/// Worker for the batch-processing queue; delegates to the backfill
/// processor.
pub struct BatchJobWorker {
    pub backfill: Arc<HistoricalBackfill>,
}

#[async_trait]
impl JobHandler<BatchJob> for BatchJobWorker {
    async fn handle(
        &self,
        payload: &BatchJob,
    ) -> Result<JobOutcome, Box<dyn std::error::Error + Send + Sync>> {
        let report = self
            .backfill
            .process_batch_historical(
                &payload.token,
                payload.network,
                payload.start_date,
                payload.end_date,
            )
            .await?;

        tracing::info!(
            request_id = %payload.request_id,
            processed = report.processed,
            skipped = report.skipped,
            errors = report.errors,
            "batch historical job finished"
        );
        Ok(JobOutcome::Completed)
    }
}
