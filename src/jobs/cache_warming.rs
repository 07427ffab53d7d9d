//! Cache warming job
//!
//! Keeps current prices for a configured set of popular tokens hot in the
//! cache so the most common reads never leave memory.

use std::sync::Arc;

use tokio::time::{interval, Duration};

use crate::models::price::Network;
use crate::services::cache::{CacheStrategy, PriceCache};
use crate::services::oracle::OracleClient;

pub async fn start_cache_warming_job(
    cache: Arc<PriceCache>,
    oracle: Arc<OracleClient>,
    popular_tokens: Vec<(Network, String)>,
    interval_secs: u64,
) {
    if popular_tokens.is_empty() {
        tracing::info!("No popular tokens configured, cache warming disabled");
        return;
    }

    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(interval_secs));

        loop {
            interval.tick().await;
            tracing::info!(tokens = popular_tokens.len(), "Starting cache warming");

            let mut warmed = 0;
            for (network, token) in &popular_tokens {
                match oracle.get_price_with_retry(token, *network, None).await {
                    Ok(Some(record)) => {
                        let key = cache.price_key(*network, token, None);
                        cache.set(&key, record, CacheStrategy::Hot).await;
                        warmed += 1;
                    }
                    Ok(None) => {
                        tracing::debug!(token = %token, network = %network, "no current price to warm");
                    }
                    Err(e) => {
                        tracing::warn!(token = %token, network = %network, "cache warming fetch failed: {}", e);
                    }
                }
            }

            tracing::info!(warmed, total = popular_tokens.len(), "Cache warming complete");
        }
    });
}
