//! Durable-store contract
//!
//! The trait pins down the operations the resolution pipeline, workers and
//! lifecycle jobs rely on. The production implementation is
//! `SqlPriceStore`; the test suite substitutes an in-memory double.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;
use crate::models::price::{Network, PriceRecord};

/// A registry row for a token the system has seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEntry {
    pub token: String,
    pub network: Network,
    pub creation_date: Option<DateTime<Utc>>,
    pub added_at: DateTime<Utc>,
}

/// Daily counter bucket for cache operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatsBucket {
    pub date: NaiveDate,
    pub hit: i64,
    pub miss: i64,
    #[serde(rename = "set")]
    pub set_ops: i64,
    #[serde(rename = "delete")]
    pub delete_ops: i64,
    pub total: i64,
    pub by_strategy: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOp {
    Hit,
    Miss,
    Set,
    Delete,
}

impl CacheOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOp::Hit => "hit",
            CacheOp::Miss => "miss",
            CacheOp::Set => "set",
            CacheOp::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveReport {
    pub archived: u64,
}

#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Upsert by (token, network, timestamp). A non-interpolated write
    /// replaces an interpolated row for the same key; an interpolated write
    /// never replaces a non-interpolated row. Fresh inserts feed the daily
    /// rollup.
    async fn store_price(&self, record: &PriceRecord) -> Result<(), StoreError>;

    /// Exact match when `timestamp` is given, most recent row otherwise.
    async fn get_price(
        &self,
        token: &str,
        network: Network,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Option<PriceRecord>, StoreError>;

    /// Up to limit/2 rows immediately before and limit/2 immediately after
    /// `target`, merged and sorted ascending. Interpolated rows are excluded
    /// so synthesized prices never feed later interpolations.
    async fn get_nearest_prices(
        &self,
        token: &str,
        network: Network,
        target: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PriceRecord>, StoreError>;

    async fn get_price_history(
        &self,
        token: &str,
        network: Network,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>, StoreError>;

    /// Upsert a TokenEntry; a later call with a creation date fills in a row
    /// created without one.
    async fn add_token(
        &self,
        token: &str,
        network: Network,
        creation_date: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    async fn get_token(
        &self,
        token: &str,
        network: Network,
    ) -> Result<Option<TokenEntry>, StoreError>;

    async fn get_all_tokens(&self) -> Result<Vec<TokenEntry>, StoreError>;

    /// Copy live rows older than `days` into the archive, then delete them,
    /// atomically.
    async fn archive_older_than(&self, days: i64) -> Result<ArchiveReport, StoreError>;

    /// Drop cache-stat buckets past the retention window.
    async fn purge_cache_stats_older_than(&self, days: i64) -> Result<u64, StoreError>;

    async fn record_cache_stat(&self, op: CacheOp, strategy: &str) -> Result<(), StoreError>;

    async fn get_cache_stats(
        &self,
        date: NaiveDate,
    ) -> Result<Option<CacheStatsBucket>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
