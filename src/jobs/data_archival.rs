//! Daily archival job
//!
//! Moves price rows past the archive threshold into the archive table and
//! purges cache-stat buckets past their retention window.

use std::sync::Arc;

use tokio::time::{interval, Duration};

use crate::config::RetentionConfig;
use crate::services::store::PriceStore;

pub async fn start_data_archival_job(
    store: Arc<dyn PriceStore>,
    retention: RetentionConfig,
    interval_secs: u64,
) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(interval_secs));

        loop {
            interval.tick().await;
            tracing::info!("Starting scheduled data archival");

            match store
                .archive_older_than(retention.archive_threshold_days)
                .await
            {
                Ok(report) => {
                    tracing::info!(archived = report.archived, "Data archival complete");
                }
                Err(e) => {
                    tracing::error!("Data archival failed: {}", e);
                }
            }

            match store
                .purge_cache_stats_older_than(retention.cache_stats_retention_days)
                .await
            {
                Ok(purged) => {
                    if purged > 0 {
                        tracing::info!(purged, "Purged expired cache-stat buckets");
                    }
                }
                Err(e) => {
                    tracing::error!("Cache-stats purge failed: {}", e);
                }
            }
        }
    });
}
