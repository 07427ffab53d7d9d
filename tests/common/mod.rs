//! Shared test doubles: an in-memory durable store and a deterministic
//! price source. Together with the real cache, interpolation engine, queues
//! and resolver they exercise the full pipeline without a database or
//! network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use pricefeed_backend::config::{
    CacheConfig, Config, InterpolationConfig, OracleConfig, QueueConfig, RetentionConfig,
    ScheduleConfig,
};
use pricefeed_backend::errors::{OracleError, StoreError};
use pricefeed_backend::models::price::{Network, PriceRecord, Provenance};
use pricefeed_backend::services::backfill::HistoricalBackfill;
use pricefeed_backend::services::cache::PriceCache;
use pricefeed_backend::services::interpolation::InterpolationEngine;
use pricefeed_backend::services::oracle::{OracleClient, PriceSource};
use pricefeed_backend::services::queue::{BatchJob, JobQueue, PriceJob};
use pricefeed_backend::services::resolver::PriceResolver;
use pricefeed_backend::services::store::{
    ArchiveReport, CacheOp, CacheStatsBucket, PriceStore, TokenEntry,
};
use pricefeed_backend::{api_router, AppState};

// ---------------------------------------------------------------------------
// In-memory durable store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RollupRow {
    pub count: usize,
    pub first_price: f64,
    pub last_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub prices: Vec<(DateTime<Utc>, f64, String)>,
}

#[derive(Default)]
pub struct MemoryStore {
    prices: Mutex<HashMap<(String, String, i64), PriceRecord>>,
    rollups: Mutex<HashMap<(String, String, NaiveDate), RollupRow>>,
    tokens: Mutex<HashMap<(String, String), TokenEntry>>,
    stats: Mutex<HashMap<NaiveDate, CacheStatsBucket>>,
    pub fail: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn key(token: &str, network: Network, ts: DateTime<Utc>) -> (String, String, i64) {
        (
            token.to_lowercase(),
            network.as_str().to_string(),
            ts.timestamp_millis(),
        )
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Database("simulated outage".into()));
        }
        Ok(())
    }

    pub fn price_count(&self) -> usize {
        self.prices.lock().unwrap().len()
    }

    pub fn rollup(&self, token: &str, network: Network, date: NaiveDate) -> Option<RollupRow> {
        self.rollups
            .lock()
            .unwrap()
            .get(&(token.to_lowercase(), network.as_str().to_string(), date))
            .cloned()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn store_price(&self, record: &PriceRecord) -> Result<(), StoreError> {
        self.check()?;
        let key = Self::key(&record.token, record.network, record.timestamp);
        let mut prices = self.prices.lock().unwrap();

        if let Some(existing) = prices.get(&key) {
            // An interpolated write never replaces a non-interpolated row.
            if record.is_interpolated() && !existing.is_interpolated() {
                return Ok(());
            }
            prices.insert(key, record.clone());
            return Ok(());
        }
        prices.insert(key, record.clone());
        drop(prices);

        let mut rollups = self.rollups.lock().unwrap();
        let rollup_key = (
            record.token.to_lowercase(),
            record.network.as_str().to_string(),
            record.timestamp.date_naive(),
        );
        let row = rollups.entry(rollup_key).or_insert_with(|| RollupRow {
            count: 0,
            first_price: record.usd,
            last_price: record.usd,
            min_price: record.usd,
            max_price: record.usd,
            prices: Vec::new(),
        });
        row.count += 1;
        row.last_price = record.usd;
        row.min_price = row.min_price.min(record.usd);
        row.max_price = row.max_price.max(record.usd);
        row.prices.push((
            record.timestamp,
            record.usd,
            record.provenance.as_str().to_string(),
        ));
        Ok(())
    }

    async fn get_price(
        &self,
        token: &str,
        network: Network,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Option<PriceRecord>, StoreError> {
        self.check()?;
        let prices = self.prices.lock().unwrap();
        match timestamp {
            Some(ts) => Ok(prices.get(&Self::key(token, network, ts)).cloned()),
            None => Ok(prices
                .values()
                .filter(|r| {
                    r.token == token.to_lowercase() && r.network == network
                })
                .max_by_key(|r| r.timestamp)
                .cloned()),
        }
    }

    async fn get_nearest_prices(
        &self,
        token: &str,
        network: Network,
        target: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PriceRecord>, StoreError> {
        self.check()?;
        let half = (limit / 2).max(1);
        let prices = self.prices.lock().unwrap();
        let mut candidates: Vec<PriceRecord> = prices
            .values()
            .filter(|r| {
                r.token == token.to_lowercase()
                    && r.network == network
                    && !r.is_interpolated()
            })
            .cloned()
            .collect();
        candidates.sort_by_key(|r| r.timestamp);

        let mut before: Vec<PriceRecord> = candidates
            .iter()
            .filter(|r| r.timestamp < target)
            .cloned()
            .collect();
        let after: Vec<PriceRecord> = candidates
            .iter()
            .filter(|r| r.timestamp > target)
            .take(half)
            .cloned()
            .collect();
        let start = before.len().saturating_sub(half);
        let mut merged: Vec<PriceRecord> = before.split_off(start);
        merged.extend(after);
        merged.sort_by_key(|r| r.timestamp);
        Ok(merged)
    }

    async fn get_price_history(
        &self,
        token: &str,
        network: Network,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>, StoreError> {
        self.check()?;
        let prices = self.prices.lock().unwrap();
        let mut result: Vec<PriceRecord> = prices
            .values()
            .filter(|r| {
                r.token == token.to_lowercase()
                    && r.network == network
                    && r.timestamp >= start
                    && r.timestamp <= end
            })
            .cloned()
            .collect();
        result.sort_by_key(|r| r.timestamp);
        Ok(result)
    }

    async fn add_token(
        &self,
        token: &str,
        network: Network,
        creation_date: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut tokens = self.tokens.lock().unwrap();
        let key = (token.to_lowercase(), network.as_str().to_string());
        match tokens.get_mut(&key) {
            Some(entry) => {
                if entry.creation_date.is_none() {
                    entry.creation_date = creation_date;
                }
            }
            None => {
                tokens.insert(
                    key,
                    TokenEntry {
                        token: token.to_lowercase(),
                        network,
                        creation_date,
                        added_at: Utc::now(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn get_token(
        &self,
        token: &str,
        network: Network,
    ) -> Result<Option<TokenEntry>, StoreError> {
        self.check()?;
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .get(&(token.to_lowercase(), network.as_str().to_string()))
            .cloned())
    }

    async fn get_all_tokens(&self) -> Result<Vec<TokenEntry>, StoreError> {
        self.check()?;
        Ok(self.tokens.lock().unwrap().values().cloned().collect())
    }

    async fn archive_older_than(&self, days: i64) -> Result<ArchiveReport, StoreError> {
        self.check()?;
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let mut prices = self.prices.lock().unwrap();
        let before = prices.len();
        prices.retain(|_, r| r.timestamp >= cutoff);
        Ok(ArchiveReport {
            archived: (before - prices.len()) as u64,
        })
    }

    async fn purge_cache_stats_older_than(&self, days: i64) -> Result<u64, StoreError> {
        self.check()?;
        let cutoff = (Utc::now() - chrono::Duration::days(days)).date_naive();
        let mut stats = self.stats.lock().unwrap();
        let before = stats.len();
        stats.retain(|date, _| *date >= cutoff);
        Ok((before - stats.len()) as u64)
    }

    async fn record_cache_stat(&self, op: CacheOp, strategy: &str) -> Result<(), StoreError> {
        self.check()?;
        let today = Utc::now().date_naive();
        let mut stats = self.stats.lock().unwrap();
        let bucket = stats.entry(today).or_insert_with(|| CacheStatsBucket {
            date: today,
            hit: 0,
            miss: 0,
            set_ops: 0,
            delete_ops: 0,
            total: 0,
            by_strategy: serde_json::json!({}),
        });
        match op {
            CacheOp::Hit => bucket.hit += 1,
            CacheOp::Miss => bucket.miss += 1,
            CacheOp::Set => bucket.set_ops += 1,
            CacheOp::Delete => bucket.delete_ops += 1,
        }
        bucket.total += 1;
        let key = format!("{}:{}", strategy, op.as_str());
        let count = bucket.by_strategy[&key].as_i64().unwrap_or(0) + 1;
        bucket.by_strategy[&key] = serde_json::json!(count);
        Ok(())
    }

    async fn get_cache_stats(
        &self,
        date: NaiveDate,
    ) -> Result<Option<CacheStatsBucket>, StoreError> {
        self.check()?;
        Ok(self.stats.lock().unwrap().get(&date).cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }
}

// ---------------------------------------------------------------------------
// Deterministic price source
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct StubPriceSource {
    prices: Mutex<HashMap<String, f64>>,
    creation_dates: Mutex<HashMap<String, DateTime<Utc>>>,
    pub calls: AtomicU32,
}

impl StubPriceSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn price_key(token: &str, network: Network, timestamp: Option<DateTime<Utc>>) -> String {
        let suffix = timestamp
            .map(|ts| ts.timestamp().to_string())
            .unwrap_or_else(|| "current".to_string());
        format!("{}|{}|{}", token.to_lowercase(), network, suffix)
    }

    pub fn set_price(
        &self,
        token: &str,
        network: Network,
        timestamp: Option<DateTime<Utc>>,
        usd: f64,
    ) {
        self.prices
            .lock()
            .unwrap()
            .insert(Self::price_key(token, network, timestamp), usd);
    }

    pub fn set_creation_date(&self, token: &str, network: Network, date: DateTime<Utc>) {
        self.creation_dates
            .lock()
            .unwrap()
            .insert(format!("{}|{}", token.to_lowercase(), network), date);
    }
}

#[async_trait]
impl PriceSource for StubPriceSource {
    async fn get_price(
        &self,
        token: &str,
        network: Network,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Option<PriceRecord>, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let usd = self
            .prices
            .lock()
            .unwrap()
            .get(&Self::price_key(token, network, timestamp))
            .copied();

        Ok(usd.map(|usd| PriceRecord {
            token: token.to_lowercase(),
            network,
            timestamp: timestamp.unwrap_or_else(Utc::now),
            usd,
            last_updated: Utc::now(),
            symbol: Some("TST".to_string()),
            name: Some("Test Token".to_string()),
            decimals: Some(18),
            total_supply: None,
            logo_uri: None,
            provenance: Provenance::FromApi,
            interpolation: None,
        }))
    }

    async fn get_token_creation_date(
        &self,
        token: &str,
        network: Network,
    ) -> Result<Option<DateTime<Utc>>, OracleError> {
        Ok(self
            .creation_dates
            .lock()
            .unwrap()
            .get(&format!("{}|{}", token.to_lowercase(), network))
            .copied())
    }
}

// ---------------------------------------------------------------------------
// Context assembly
// ---------------------------------------------------------------------------

pub fn test_config() -> Config {
    Config {
        app_name: "app".to_string(),
        port: 0,
        supported_networks: Network::all().to_vec(),
        popular_tokens: Vec::new(),
        cache: CacheConfig {
            ttl_hot_secs: 300,
            ttl_warm_secs: 3600,
            ttl_interpolated_secs: 900,
            max_capacity: 1000,
        },
        oracle: OracleConfig {
            api_key: "test".to_string(),
            max_retries: 2,
            retry_delay_ms: 1,
            timeout_secs: 1,
            batch_size: 10,
            rate_limit_per_second: 1000,
        },
        interpolation: InterpolationConfig {
            max_data_points: 10,
            max_time_gap_hours: 72,
            min_confidence_threshold: 0.3,
            extrapolation_max_change_percent: 20.0,
        },
        queue: QueueConfig {
            price_concurrency: 1,
            batch_concurrency: 1,
            max_attempts: 2,
            backoff_base_ms: 1,
        },
        retention: RetentionConfig {
            archive_threshold_days: 365,
            cache_stats_retention_days: 30,
        },
        schedules: ScheduleConfig {
            cache_cleanup_interval_secs: 3600,
            archival_interval_secs: 86400,
            cache_warming_interval_secs: 21600,
            cache_warming_enabled: false,
            metrics_interval_secs: 900,
            metrics_enabled: false,
            db_optimization_interval_secs: 604800,
            historical_fetch_interval_secs: 86400,
        },
    }
}

pub struct TestContext {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub source: Arc<StubPriceSource>,
    pub backfill: Arc<HistoricalBackfill>,
    pub router: axum::Router,
}

/// Full pipeline wiring over the in-memory store and stub source. Queue
/// workers are NOT started; tests that need them start them explicitly so
/// queued jobs stay observable.
pub fn build_context() -> TestContext {
    let config = Arc::new(test_config());
    let store = MemoryStore::new();
    let source = StubPriceSource::new();

    let store_dyn: Arc<dyn PriceStore> = store.clone();
    let cache = Arc::new(PriceCache::new(&config.app_name, &config.cache));

    let oracle = Arc::new(OracleClient::new(source.clone(), &config.oracle));
    let interpolator = Arc::new(InterpolationEngine::new(
        store_dyn.clone(),
        config.interpolation.clone(),
    ));

    let price_queue: JobQueue<PriceJob> = JobQueue::new(
        "price-processing",
        config.queue.max_attempts,
        config.queue.backoff_base_ms,
    );
    let batch_queue: JobQueue<BatchJob> = JobQueue::new(
        "batch-processing",
        config.queue.max_attempts,
        config.queue.backoff_base_ms,
    );

    let backfill = Arc::new(HistoricalBackfill::new(store_dyn.clone(), oracle.clone()));

    let resolver = Arc::new(PriceResolver::new(
        cache.clone(),
        store_dyn.clone(),
        oracle.clone(),
        interpolator.clone(),
        price_queue.clone(),
    ));

    let state = AppState {
        config,
        store: store_dyn,
        cache,
        oracle,
        resolver,
        price_queue,
        batch_queue,
        oracle_configured: true,
    };

    let router = api_router(state.clone());

    TestContext {
        state,
        store,
        source,
        backfill,
        router,
    }
}
