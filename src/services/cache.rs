//! In-memory price cache
//!
//! A single moka cache holds every entry; the TTL is chosen per entry from
//! the strategy the writer picked. Cold and Archive entries are not cached
//! at all. Every operation feeds the daily cache-stats bucket through the
//! durable store, best-effort.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use moka::Expiry;

use crate::config::CacheConfig;
use crate::models::price::{Network, PriceRecord};
use crate::services::store::{CacheOp, PriceStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
    /// Current prices, short TTL
    Hot,
    /// Historical and re-populated entries
    Warm,
    /// Synthesized values, shorter than warm
    Interpolated,
    /// Not cached
    Cold,
    /// Not cached
    Archive,
}

impl CacheStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStrategy::Hot => "hot",
            CacheStrategy::Warm => "warm",
            CacheStrategy::Interpolated => "interpolated",
            CacheStrategy::Cold => "cold",
            CacheStrategy::Archive => "archive",
        }
    }

    fn is_cacheable(&self) -> bool {
        !matches!(self, CacheStrategy::Cold | CacheStrategy::Archive)
    }
}

#[derive(Clone)]
struct CachedPrice {
    record: PriceRecord,
    strategy: CacheStrategy,
    ttl: Duration,
    stored_at: Instant,
}

struct StrategyExpiry;

impl Expiry<String, CachedPrice> for StrategyExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedPrice,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

pub struct PriceCache {
    app_name: String,
    entries: Cache<String, CachedPrice>,
    ttl_hot: Duration,
    ttl_warm: Duration,
    ttl_interpolated: Duration,
    stats: std::sync::RwLock<Option<Arc<dyn PriceStore>>>,
}

impl PriceCache {
    pub fn new(app_name: &str, config: &CacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(StrategyExpiry)
            .build();

        Self {
            app_name: app_name.to_string(),
            entries,
            ttl_hot: Duration::from_secs(config.ttl_hot_secs),
            ttl_warm: Duration::from_secs(config.ttl_warm_secs),
            ttl_interpolated: Duration::from_secs(config.ttl_interpolated_secs),
            stats: std::sync::RwLock::new(None),
        }
    }

    /// Wire the stats sink after the store exists. Until then operations are
    /// simply not counted.
    pub fn set_stats_sink(&self, store: Arc<dyn PriceStore>) {
        if let Ok(mut guard) = self.stats.write() {
            *guard = Some(store);
        }
    }

    /// Stable key format: `{app}:price:{network}:{token_lc}:{timestamp|current}`.
    /// The token is lowercased here as well; mixed-case keys would fragment
    /// the cache and silently miss.
    pub fn price_key(
        &self,
        network: Network,
        token: &str,
        timestamp: Option<chrono::DateTime<chrono::Utc>>,
    ) -> String {
        let suffix = match timestamp {
            Some(ts) => ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            None => "current".to_string(),
        };
        format!(
            "{}:price:{}:{}:{}",
            self.app_name,
            network,
            token.to_lowercase(),
            suffix
        )
    }

    pub async fn get(&self, key: &str) -> Option<PriceRecord> {
        match self.entries.get(key).await {
            Some(entry) => {
                self.record_stat(CacheOp::Hit, entry.strategy.as_str());
                Some(entry.record)
            }
            None => {
                self.record_stat(CacheOp::Miss, "none");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, record: PriceRecord, strategy: CacheStrategy) {
        if !strategy.is_cacheable() {
            return;
        }
        let ttl = match strategy {
            CacheStrategy::Hot => self.ttl_hot,
            CacheStrategy::Warm => self.ttl_warm,
            CacheStrategy::Interpolated => self.ttl_interpolated,
            CacheStrategy::Cold | CacheStrategy::Archive => return,
        };
        self.entries
            .insert(
                key.to_string(),
                CachedPrice {
                    record,
                    strategy,
                    ttl,
                    stored_at: Instant::now(),
                },
            )
            .await;
        self.record_stat(CacheOp::Set, strategy.as_str());
    }

    pub async fn delete(&self, key: &str) {
        self.entries.invalidate(key).await;
        self.record_stat(CacheOp::Delete, "none");
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remaining time to live, None when the key is absent.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let entry = self.entries.get(key).await?;
        entry.ttl.checked_sub(entry.stored_at.elapsed())
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Cache-stat recording is fire-and-forget; a store hiccup degrades
    /// observability, never correctness.
    fn record_stat(&self, op: CacheOp, strategy: &str) {
        let sink = match self.stats.read() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        if let Some(store) = sink {
            let strategy = strategy.to_string();
            tokio::spawn(async move {
                if let Err(e) = store.record_cache_stat(op, &strategy).await {
                    tracing::debug!("failed to record cache stat: {}", e);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::price::{parse_timestamp, Provenance};

    fn sample_record() -> PriceRecord {
        PriceRecord {
            token: "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2".to_string(),
            network: Network::Ethereum,
            timestamp: parse_timestamp("2024-01-01T00:00:00Z").unwrap(),
            usd: 1.23,
            last_updated: parse_timestamp("2024-01-01T00:00:00Z").unwrap(),
            symbol: None,
            name: None,
            decimals: None,
            total_supply: None,
            logo_uri: None,
            provenance: Provenance::FromApi,
            interpolation: None,
        }
    }

    fn test_cache() -> PriceCache {
        PriceCache::new(
            "app",
            &CacheConfig {
                ttl_hot_secs: 300,
                ttl_warm_secs: 3600,
                ttl_interpolated_secs: 900,
                max_capacity: 100,
            },
        )
    }

    #[test]
    fn key_embeds_timestamp_or_current_and_lowercases() {
        let cache = test_cache();
        let ts = parse_timestamp("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(
            cache.price_key(
                Network::Ethereum,
                "0xC02AAA39B223FE8D0A0E5C4F27EAD9083C756CC2",
                Some(ts)
            ),
            "app:price:ethereum:0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2:2024-01-01T00:00:00Z"
        );
        assert_eq!(
            cache.price_key(Network::Polygon, "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2", None),
            "app:price:polygon:0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2:current"
        );
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = test_cache();
        let record = sample_record();
        let key = cache.price_key(Network::Ethereum, &record.token, None);
        cache.set(&key, record.clone(), CacheStrategy::Hot).await;
        let got = cache.get(&key).await.unwrap();
        assert_eq!(got.usd, record.usd);
        assert!(cache.exists(&key).await);
        assert!(cache.ttl(&key).await.unwrap() <= Duration::from_secs(300));
    }

    #[tokio::test]
    async fn cold_and_archive_are_not_cached() {
        let cache = test_cache();
        let record = sample_record();
        cache.set("k1", record.clone(), CacheStrategy::Cold).await;
        cache.set("k2", record, CacheStrategy::Archive).await;
        assert!(cache.get("k1").await.is_none());
        assert!(cache.get("k2").await.is_none());
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = test_cache();
        cache.set("k", sample_record(), CacheStrategy::Warm).await;
        cache.delete("k").await;
        assert!(cache.get("k").await.is_none());
    }
}
