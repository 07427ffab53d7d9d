//! Environment-driven configuration
//!
//! Every tunable is read once at startup with a sensible default so the
//! service boots from a bare `.env` with only DATABASE_URL set.

use std::env;
use std::str::FromStr;

use crate::models::price::Network;

#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    pub port: u16,
    pub supported_networks: Vec<Network>,
    /// Popular (network, token) pairs warmed by the cache-warming job
    pub popular_tokens: Vec<(Network, String)>,
    pub cache: CacheConfig,
    pub oracle: OracleConfig,
    pub interpolation: InterpolationConfig,
    pub queue: QueueConfig,
    pub retention: RetentionConfig,
    pub schedules: ScheduleConfig,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl_hot_secs: u64,
    pub ttl_warm_secs: u64,
    pub ttl_interpolated_secs: u64,
    pub max_capacity: u64,
}

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub api_key: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
    pub batch_size: usize,
    pub rate_limit_per_second: u64,
}

#[derive(Debug, Clone)]
pub struct InterpolationConfig {
    pub max_data_points: usize,
    pub max_time_gap_hours: i64,
    pub min_confidence_threshold: f64,
    pub extrapolation_max_change_percent: f64,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub price_concurrency: usize,
    pub batch_concurrency: usize,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub archive_threshold_days: i64,
    pub cache_stats_retention_days: i64,
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub cache_cleanup_interval_secs: u64,
    pub archival_interval_secs: u64,
    pub cache_warming_interval_secs: u64,
    pub cache_warming_enabled: bool,
    pub metrics_interval_secs: u64,
    pub metrics_enabled: bool,
    pub db_optimization_interval_secs: u64,
    pub historical_fetch_interval_secs: u64,
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Self {
        let supported_networks = match env::var("SUPPORTED_NETWORKS") {
            Ok(raw) => {
                let parsed: Vec<Network> = raw
                    .split(',')
                    .filter_map(|s| s.trim().parse::<Network>().ok())
                    .collect();
                if parsed.is_empty() {
                    Network::all().to_vec()
                } else {
                    parsed
                }
            }
            Err(_) => Network::all().to_vec(),
        };

        // POPULAR_TOKENS is a comma list of network:token entries, e.g.
        // "ethereum:0xc02a...,polygon:0x0d50..."
        let popular_tokens = env::var("POPULAR_TOKENS")
            .map(|raw| {
                raw.split(',')
                    .filter_map(|entry| {
                        let (network, token) = entry.trim().split_once(':')?;
                        let network = network.parse::<Network>().ok()?;
                        Some((network, token.to_lowercase()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            app_name: env_string("APP_NAME", "pricefeed"),
            port: env_parse("PORT", 3002),
            supported_networks,
            popular_tokens,
            cache: CacheConfig {
                ttl_hot_secs: env_parse("CACHE_TTL_HOT_SECS", 300),
                ttl_warm_secs: env_parse("CACHE_TTL_WARM_SECS", 3600),
                ttl_interpolated_secs: env_parse("CACHE_TTL_INTERPOLATED_SECS", 900),
                max_capacity: env_parse("CACHE_MAX_CAPACITY", 10_000),
            },
            oracle: OracleConfig {
                api_key: env_string("ALCHEMY_API_KEY", ""),
                max_retries: env_parse("ORACLE_MAX_RETRIES", 3),
                retry_delay_ms: env_parse("ORACLE_RETRY_DELAY_MS", 1000),
                timeout_secs: env_parse("ORACLE_TIMEOUT_SECS", 10),
                batch_size: env_parse("ORACLE_BATCH_SIZE", 10),
                rate_limit_per_second: env_parse("ORACLE_RATE_LIMIT_PER_SECOND", 5),
            },
            interpolation: InterpolationConfig {
                max_data_points: env_parse("INTERPOLATION_MAX_DATA_POINTS", 10),
                max_time_gap_hours: env_parse("INTERPOLATION_MAX_TIME_GAP_HOURS", 72),
                min_confidence_threshold: env_parse("INTERPOLATION_MIN_CONFIDENCE", 0.3),
                extrapolation_max_change_percent: env_parse(
                    "EXTRAPOLATION_MAX_CHANGE_PERCENT",
                    20.0,
                ),
            },
            queue: QueueConfig {
                price_concurrency: env_parse("PRICE_QUEUE_CONCURRENCY", 5),
                batch_concurrency: env_parse("BATCH_QUEUE_CONCURRENCY", 2),
                max_attempts: env_parse("QUEUE_MAX_ATTEMPTS", 3),
                backoff_base_ms: env_parse("QUEUE_BACKOFF_BASE_MS", 2000),
            },
            retention: RetentionConfig {
                archive_threshold_days: env_parse("ARCHIVE_THRESHOLD_DAYS", 365),
                cache_stats_retention_days: env_parse("CACHE_STATS_RETENTION_DAYS", 30),
            },
            schedules: ScheduleConfig {
                cache_cleanup_interval_secs: env_parse("CACHE_CLEANUP_INTERVAL_SECS", 3600),
                archival_interval_secs: env_parse("ARCHIVAL_INTERVAL_SECS", 86400),
                cache_warming_interval_secs: env_parse("CACHE_WARMING_INTERVAL_SECS", 21600),
                cache_warming_enabled: env_parse("CACHE_WARMING_ENABLED", true),
                metrics_interval_secs: env_parse("METRICS_INTERVAL_SECS", 900),
                metrics_enabled: env_parse("METRICS_ENABLED", true),
                db_optimization_interval_secs: env_parse("DB_OPTIMIZATION_INTERVAL_SECS", 604800),
                historical_fetch_interval_secs: env_parse("HISTORICAL_FETCH_INTERVAL_SECS", 86400),
            },
        }
    }
}
