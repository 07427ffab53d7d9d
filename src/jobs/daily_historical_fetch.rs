//! Daily historical backfill job
//!
//! Walks the token registry once a day: fills in missing creation dates via
//! the oracle, then enqueues one batch job per token spanning its creation
//! date through today. The batch worker itself skips days that already have
//! rows, so re-enqueueing the full range every day is cheap.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};

use crate::services::oracle::OracleClient;
use crate::services::queue::{BatchJob, JobQueue, PRIORITY_HISTORICAL};
use crate::services::store::PriceStore;

pub async fn start_daily_historical_fetch_job(
    store: Arc<dyn PriceStore>,
    oracle: Arc<OracleClient>,
    batch_queue: JobQueue<BatchJob>,
    interval_secs: u64,
) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(interval_secs));

        loop {
            interval.tick().await;
            tracing::info!("Starting daily historical fetch");

            if let Err(e) = enqueue_daily_backfills(&store, &oracle, &batch_queue).await {
                tracing::error!("Daily historical fetch failed: {}", e);
            }
        }
    });
}

pub async fn enqueue_daily_backfills(
    store: &Arc<dyn PriceStore>,
    oracle: &Arc<OracleClient>,
    batch_queue: &JobQueue<BatchJob>,
) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
    let tokens = store.get_all_tokens().await?;
    let today = Utc::now();
    let mut enqueued = 0;

    tracing::info!(tokens = tokens.len(), "Enqueuing historical backfills");

    for entry in tokens {
        let creation_date = match entry.creation_date {
            Some(date) => Some(date),
            None => {
                match oracle
                    .get_token_creation_date(&entry.token, entry.network)
                    .await
                {
                    Ok(Some(date)) => {
                        if let Err(e) = store
                            .add_token(&entry.token, entry.network, Some(date))
                            .await
                        {
                            tracing::warn!(token = %entry.token, "failed to persist creation date: {}", e);
                        }
                        Some(date)
                    }
                    Ok(None) => None,
                    Err(e) => {
                        tracing::warn!(token = %entry.token, "creation date discovery failed: {}", e);
                        None
                    }
                }
            }
        };

        let Some(creation_date) = creation_date else {
            tracing::debug!(
                token = %entry.token,
                network = %entry.network,
                "creation date unknown, skipping backfill"
            );
            continue;
        };

        let request_id = format!(
            "daily-{}-{}-{}",
            entry.network,
            entry.token,
            today.date_naive()
        );
        let job_id = batch_queue.enqueue(
            BatchJob {
                token: entry.token.clone(),
                network: entry.network,
                start_date: creation_date,
                end_date: today,
                request_id,
            },
            PRIORITY_HISTORICAL,
        );
        tracing::debug!(
            token = %entry.token,
            network = %entry.network,
            job_id = %job_id,
            start = %creation_date,
            "enqueued historical backfill"
        );
        enqueued += 1;
    }

    tracing::info!(enqueued, "Daily historical fetch complete");
    Ok(enqueued)
}
