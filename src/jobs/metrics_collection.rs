//! Metrics sampling job
//!
//! Samples the day's cache-stat bucket and forwards it to the metrics sink
//! (structured log fields; a scraper picks them up from there).

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};

use crate::services::store::PriceStore;

pub async fn start_metrics_collection_job(store: Arc<dyn PriceStore>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(interval_secs));

        loop {
            interval.tick().await;
            let today = Utc::now().date_naive();

            match store.get_cache_stats(today).await {
                Ok(Some(bucket)) => {
                    let hit_rate = if bucket.hit + bucket.miss > 0 {
                        bucket.hit as f64 / (bucket.hit + bucket.miss) as f64
                    } else {
                        0.0
                    };
                    tracing::info!(
                        date = %bucket.date,
                        hit = bucket.hit,
                        miss = bucket.miss,
                        set = bucket.set_ops,
                        delete = bucket.delete_ops,
                        total = bucket.total,
                        hit_rate,
                        "cache stats sample"
                    );
                }
                Ok(None) => {
                    tracing::debug!(date = %today, "no cache activity recorded yet today");
                }
                Err(e) => {
                    tracing::error!("Cache stats sampling failed: {}", e);
                }
            }
        }
    });
}
