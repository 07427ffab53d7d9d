//! Five-tier price resolution pipeline
//!
//! cache → durable store → oracle → interpolation → deferred fill. Each tier
//! only runs when the previous one had nothing; a transient oracle failure
//! is not a pipeline failure, but a store failure on the authoritative
//! lookup is, so a stale interpolation can never shadow a durable answer.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::errors::ResolveError;
use crate::models::price::{Network, PriceRecord, Provenance, TokenAddress};
use crate::services::cache::{CacheStrategy, PriceCache};
use crate::services::interpolation::InterpolationEngine;
use crate::services::oracle::OracleClient;
use crate::services::queue::{JobQueue, PriceJob, PRIORITY_CURRENT, PRIORITY_HISTORICAL};
use crate::services::store::PriceStore;
use crate::services::workers::register_token_if_new;

#[derive(Debug, Clone)]
pub enum Resolution {
    Found(PriceRecord),
    Queued { job_id: String },
}

pub struct PriceResolver {
    cache: Arc<PriceCache>,
    store: Arc<dyn PriceStore>,
    oracle: Arc<OracleClient>,
    interpolator: Arc<InterpolationEngine>,
    price_queue: JobQueue<PriceJob>,
}

impl PriceResolver {
    pub fn new(
        cache: Arc<PriceCache>,
        store: Arc<dyn PriceStore>,
        oracle: Arc<OracleClient>,
        interpolator: Arc<InterpolationEngine>,
        price_queue: JobQueue<PriceJob>,
    ) -> Self {
        Self {
            cache,
            store,
            oracle,
            interpolator,
            price_queue,
        }
    }

    pub async fn resolve(
        &self,
        token: &TokenAddress,
        network: Network,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Resolution, ResolveError> {
        let key = self.cache.price_key(network, token.as_str(), timestamp);

        // Tier 1: cache
        if let Some(cached) = self.cache.get(&key).await {
            if cached.is_interpolated() {
                // A non-interpolated row may have landed durably since this
                // interpolation was cached; the store wins.
                if let Some(stored) = self
                    .store
                    .get_price(token.as_str(), network, timestamp)
                    .await?
                {
                    if !stored.is_interpolated() {
                        let stored = stored.with_provenance(Provenance::FromDb);
                        self.cache
                            .set(&key, stored.clone(), CacheStrategy::Warm)
                            .await;
                        return Ok(Resolution::Found(stored));
                    }
                }
            }
            tracing::debug!(key = %key, "resolved from cache");
            return Ok(Resolution::Found(cached.with_provenance(Provenance::FromCache)));
        }

        // Tier 2: durable store. Unreachability here is a hard failure.
        if let Some(stored) = self
            .store
            .get_price(token.as_str(), network, timestamp)
            .await?
        {
            let stored = stored.with_provenance(Provenance::FromDb);
            self.cache
                .set(&key, stored.clone(), CacheStrategy::Warm)
                .await;
            tracing::debug!(key = %key, "resolved from store");
            return Ok(Resolution::Found(stored));
        }

        // Tier 3: upstream oracle
        match self
            .oracle
            .get_price_with_retry(token.as_str(), network, timestamp)
            .await
        {
            Ok(Some(record)) => {
                if let Err(e) = self.store.store_price(&record).await {
                    tracing::warn!(key = %key, "write-through to store failed: {}", e);
                }
                let strategy = if timestamp.is_some() {
                    CacheStrategy::Warm
                } else {
                    CacheStrategy::Hot
                };
                let record = record.with_provenance(Provenance::FromApi);
                self.cache.set(&key, record.clone(), strategy).await;
                tokio::spawn(register_token_if_new(
                    self.store.clone(),
                    self.oracle.clone(),
                    token.as_str().to_string(),
                    network,
                ));
                tracing::debug!(key = %key, "resolved from oracle");
                return Ok(Resolution::Found(record));
            }
            Ok(None) => {
                tracing::debug!(key = %key, "oracle has no data, trying interpolation");
            }
            Err(e) => {
                tracing::warn!(key = %key, "oracle unavailable, trying interpolation: {}", e);
            }
        }

        // Tier 4: interpolation. A store failure while fetching neighbors is
        // logged and treated as a decline; the queue still gets the job.
        let target = timestamp.unwrap_or_else(Utc::now);
        match self
            .interpolator
            .interpolate(token.as_str(), network, target)
            .await
        {
            Ok(Some(record)) => {
                if let Err(e) = self.store.store_price(&record).await {
                    tracing::warn!(key = %key, "failed to persist interpolation: {}", e);
                }
                self.cache
                    .set(&key, record.clone(), CacheStrategy::Interpolated)
                    .await;
                tracing::debug!(key = %key, "resolved by interpolation");
                return Ok(Resolution::Found(record));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %key, "interpolation neighbor fetch failed: {}", e);
            }
        }

        // Tier 5: deferred fill
        let priority = if timestamp.is_none() {
            PRIORITY_CURRENT
        } else {
            PRIORITY_HISTORICAL
        };
        let job_id = self.price_queue.enqueue(
            PriceJob {
                token: token.as_str().to_string(),
                network,
                timestamp,
            },
            priority,
        );
        tracing::info!(key = %key, job_id = %job_id, "deferred to price queue");
        Ok(Resolution::Queued { job_id })
    }
}
