//! Maintenance hooks
//!
//! Cache cleanup is a no-op beyond per-entry TTL and database optimization
//! is reserved for a future compact/reindex pass; both loops are kept so the
//! schedules stay wired and observable.

use std::sync::Arc;

use tokio::time::{interval, Duration};

use crate::config::ScheduleConfig;
use crate::services::cache::PriceCache;

pub async fn start_maintenance_jobs(cache: Arc<PriceCache>, schedules: ScheduleConfig) {
    let cleanup_secs = schedules.cache_cleanup_interval_secs;
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(cleanup_secs));
        loop {
            interval.tick().await;
            tracing::debug!(
                entries = cache.entry_count(),
                "cache cleanup tick (TTL eviction is automatic)"
            );
        }
    });

    let optimize_secs = schedules.db_optimization_interval_secs;
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(optimize_secs));
        loop {
            interval.tick().await;
            tracing::debug!("db optimization tick (reserved)");
        }
    });
}
