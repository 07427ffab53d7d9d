//! In-process job queues
//!
//! Two named queues back the deferred-fill tier: `price-processing` for
//! single-price fetches and `batch-processing` for historical backfills.
//! Jobs carry a priority (current-price work outranks historical), bounded
//! attempts with exponential backoff, and idempotent payloads so duplicate
//! enqueues and retries are safe.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::models::price::Network;

pub const PRIORITY_CURRENT: u8 = 10;
pub const PRIORITY_HISTORICAL: u8 = 1;

/// Payload for the price-processing queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceJob {
    pub token: String,
    pub network: Network,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Payload for the batch-processing queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    pub token: String,
    pub network: Network,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub request_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Skipped,
    NoData,
}

#[async_trait]
pub trait JobHandler<T>: Send + Sync {
    async fn handle(&self, payload: &T) -> Result<JobOutcome, Box<dyn std::error::Error + Send + Sync>>;
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobCounts {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
}

struct QueuedJob<T> {
    priority: u8,
    seq: u64,
    attempts: u32,
    job_id: String,
    payload: T,
}

impl<T> PartialEq for QueuedJob<T> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<T> Eq for QueuedJob<T> {}

impl<T> PartialOrd for QueuedJob<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for QueuedJob<T> {
    // Max-heap: higher priority first, then older jobs first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueInner<T> {
    name: String,
    heap: Mutex<BinaryHeap<QueuedJob<T>>>,
    notify: Notify,
    seq: AtomicU64,
    accepting: AtomicBool,
    active: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    max_attempts: u32,
    backoff_base_ms: u64,
}

pub struct JobQueue<T> {
    inner: Arc<QueueInner<T>>,
}

impl<T> Clone for JobQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> JobQueue<T> {
    pub fn new(name: &str, max_attempts: u32, backoff_base_ms: u64) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                name: name.to_string(),
                heap: Mutex::new(BinaryHeap::new()),
                notify: Notify::new(),
                seq: AtomicU64::new(0),
                accepting: AtomicBool::new(true),
                active: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                max_attempts: max_attempts.max(1),
                backoff_base_ms,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn enqueue(&self, payload: T, priority: u8) -> String {
        let seq = self.inner.seq.fetch_add(1, AtomicOrdering::SeqCst);
        let job_id = format!("{}-{}", self.inner.name, seq + 1);
        self.push(QueuedJob {
            priority,
            seq,
            attempts: 0,
            job_id: job_id.clone(),
            payload,
        });
        job_id
    }

    fn push(&self, job: QueuedJob<T>) {
        {
            let mut heap = self.inner.heap.lock().expect("queue mutex poisoned");
            heap.push(job);
        }
        self.inner.notify.notify_one();
    }

    pub fn counts(&self) -> JobCounts {
        let waiting = self
            .inner
            .heap
            .lock()
            .map(|heap| heap.len() as u64)
            .unwrap_or(0);
        JobCounts {
            waiting,
            active: self.inner.active.load(AtomicOrdering::SeqCst),
            completed: self.inner.completed.load(AtomicOrdering::SeqCst),
            failed: self.inner.failed.load(AtomicOrdering::SeqCst),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.accepting.load(AtomicOrdering::SeqCst)
    }

    /// Stop workers after the backlog drains. Pending jobs already enqueued
    /// are still processed.
    pub fn close(&self) {
        self.inner.accepting.store(false, AtomicOrdering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Wait until the backlog and in-flight work are gone, bounded by
    /// `timeout`.
    pub async fn drain(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let counts = self.counts();
            if counts.waiting == 0 && counts.active == 0 {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    queue = %self.inner.name,
                    waiting = counts.waiting,
                    active = counts.active,
                    "drain timed out with jobs outstanding"
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pub fn start_workers(&self, concurrency: usize, handler: Arc<dyn JobHandler<T>>) {
        for worker_id in 0..concurrency.max(1) {
            let queue = self.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                queue.worker_loop(worker_id, handler).await;
            });
        }
        tracing::info!(
            queue = %self.inner.name,
            concurrency = concurrency.max(1),
            "queue workers started"
        );
    }

    async fn worker_loop(&self, worker_id: usize, handler: Arc<dyn JobHandler<T>>) {
        loop {
            let job = loop {
                // The active count rises inside the lock so a drained queue
                // is never momentarily invisible to `drain`.
                let popped = {
                    let mut heap = self.inner.heap.lock().expect("queue mutex poisoned");
                    let job = heap.pop();
                    if job.is_some() {
                        self.inner.active.fetch_add(1, AtomicOrdering::SeqCst);
                    }
                    job
                };
                if let Some(job) = popped {
                    break job;
                }
                if !self.inner.accepting.load(AtomicOrdering::SeqCst) {
                    tracing::debug!(
                        queue = %self.inner.name,
                        worker_id,
                        "worker exiting: queue closed and drained"
                    );
                    return;
                }
                self.inner.notify.notified().await;
            };

            let result = handler.handle(&job.payload).await;
            self.inner.active.fetch_sub(1, AtomicOrdering::SeqCst);

            match result {
                Ok(outcome) => {
                    self.inner.completed.fetch_add(1, AtomicOrdering::SeqCst);
                    tracing::debug!(
                        queue = %self.inner.name,
                        job_id = %job.job_id,
                        ?outcome,
                        "job finished"
                    );
                }
                Err(e) => {
                    let next_attempt = job.attempts + 1;
                    if next_attempt < self.inner.max_attempts {
                        let delay_ms =
                            self.inner.backoff_base_ms * 2u64.saturating_pow(job.attempts);
                        tracing::warn!(
                            queue = %self.inner.name,
                            job_id = %job.job_id,
                            attempt = next_attempt,
                            delay_ms,
                            "job failed, will retry: {}",
                            e
                        );
                        let queue = self.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                            queue.push(QueuedJob {
                                attempts: next_attempt,
                                ..job
                            });
                        });
                    } else {
                        self.inner.failed.fetch_add(1, AtomicOrdering::SeqCst);
                        tracing::error!(
                            queue = %self.inner.name,
                            job_id = %job.job_id,
                            attempts = next_attempt,
                            "job abandoned after exhausting attempts: {}",
                            e
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct Recorder {
        handled: Mutex<Vec<String>>,
        fail_first: AtomicU32,
    }

    #[async_trait]
    impl JobHandler<PriceJob> for Recorder {
        async fn handle(
            &self,
            payload: &PriceJob,
        ) -> Result<JobOutcome, Box<dyn std::error::Error + Send + Sync>> {
            let remaining = self.fail_first.load(AtomicOrdering::SeqCst);
            if remaining > 0 {
                self.fail_first.fetch_sub(1, AtomicOrdering::SeqCst);
                return Err("simulated failure".into());
            }
            self.handled
                .lock()
                .unwrap()
                .push(payload.token.clone());
            Ok(JobOutcome::Completed)
        }
    }

    fn job(token: &str) -> PriceJob {
        PriceJob {
            token: token.to_string(),
            network: Network::Ethereum,
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn higher_priority_jobs_run_first() {
        let queue: JobQueue<PriceJob> = JobQueue::new("price-processing", 3, 10);
        let handler = Arc::new(Recorder {
            handled: Mutex::new(Vec::new()),
            fail_first: AtomicU32::new(0),
        });

        // Enqueue before any worker exists so ordering is deterministic.
        queue.enqueue(job("0x01"), PRIORITY_HISTORICAL);
        queue.enqueue(job("0x02"), PRIORITY_CURRENT);
        queue.enqueue(job("0x03"), PRIORITY_HISTORICAL);

        queue.start_workers(1, handler.clone());
        queue.drain(Duration::from_secs(5)).await;

        let handled = handler.handled.lock().unwrap().clone();
        assert_eq!(handled, vec!["0x02", "0x01", "0x03"]);
        assert_eq!(queue.counts().completed, 3);
    }

    #[tokio::test]
    async fn failed_jobs_retry_then_complete() {
        let queue: JobQueue<PriceJob> = JobQueue::new("price-processing", 3, 1);
        let handler = Arc::new(Recorder {
            handled: Mutex::new(Vec::new()),
            fail_first: AtomicU32::new(2),
        });

        queue.start_workers(1, handler.clone());
        queue.enqueue(job("0x01"), PRIORITY_CURRENT);

        // Two failures then success on the third attempt.
        tokio::time::sleep(Duration::from_millis(200)).await;
        queue.drain(Duration::from_secs(5)).await;

        assert_eq!(handler.handled.lock().unwrap().len(), 1);
        let counts = queue.counts();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.failed, 0);
    }

    #[tokio::test]
    async fn exhausted_jobs_are_abandoned() {
        let queue: JobQueue<PriceJob> = JobQueue::new("price-processing", 2, 1);
        let handler = Arc::new(Recorder {
            handled: Mutex::new(Vec::new()),
            fail_first: AtomicU32::new(10),
        });

        queue.start_workers(1, handler.clone());
        queue.enqueue(job("0x01"), PRIORITY_CURRENT);

        tokio::time::sleep(Duration::from_millis(300)).await;
        queue.drain(Duration::from_secs(5)).await;

        let counts = queue.counts();
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.completed, 0);
        assert!(handler.handled.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn job_ids_are_unique_and_namespaced() {
        let queue: JobQueue<PriceJob> = JobQueue::new("batch-processing", 1, 1);
        let a = queue.enqueue(job("0x01"), PRIORITY_CURRENT);
        let b = queue.enqueue(job("0x02"), PRIORITY_CURRENT);
        assert_ne!(a, b);
        assert!(a.starts_with("batch-processing-"));
    }
}
