//! Postgres implementation of the durable-store contract
//!
//! Query-builder chains cover the simple lookups; the price and rollup
//! upserts are raw parameterized SQL because their convergence rules
//! (conditional replace, LEAST/GREATEST/count+1 aggregation) need a single
//! atomic statement under concurrent writers.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection, EntityTrait, Order,
    QueryFilter, QueryOrder, QuerySelect, Statement, TransactionTrait,
};
use serde_json::json;

use crate::entities::{cache_stats, prices, tokens, prelude::*};
use crate::errors::StoreError;
use crate::models::price::{
    InterpolationDetails, InterpolationMethod, Network, PriceRecord, Provenance,
};
use crate::services::store::{ArchiveReport, CacheOp, CacheStatsBucket, PriceStore, TokenEntry};

#[derive(Clone)]
pub struct SqlPriceStore {
    db: DatabaseConnection,
}

impl SqlPriceStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_record(model: prices::Model) -> Result<PriceRecord, StoreError> {
        let network = model
            .network
            .parse::<Network>()
            .map_err(StoreError::InvalidRecord)?;
        let usd = model
            .usd
            .to_f64()
            .ok_or_else(|| StoreError::InvalidRecord(format!("unrepresentable usd: {}", model.usd)))?;

        let interpolation = if model.interpolated {
            Some(InterpolationDetails {
                method: match model.interpolation_method.as_deref() {
                    Some("extrapolation") => InterpolationMethod::Extrapolation,
                    _ => InterpolationMethod::Linear,
                },
                confidence: model.confidence.and_then(|c| c.to_f64()).unwrap_or(0.0),
                data_points_used: Vec::new(),
            })
        } else {
            None
        };

        Ok(PriceRecord {
            token: model.token,
            network,
            timestamp: model.timestamp.with_timezone(&Utc),
            usd,
            last_updated: model.last_updated.with_timezone(&Utc),
            symbol: model.symbol,
            name: model.name,
            decimals: model.decimals,
            total_supply: model.total_supply,
            logo_uri: model.logo_uri,
            provenance: if model.interpolated {
                Provenance::Interpolated
            } else {
                Provenance::FromDb
            },
            interpolation,
        })
    }

    fn token_model_to_entry(model: tokens::Model) -> Result<TokenEntry, StoreError> {
        Ok(TokenEntry {
            token: model.token,
            network: model
                .network
                .parse::<Network>()
                .map_err(StoreError::InvalidRecord)?,
            creation_date: model.creation_date.map(|d| d.with_timezone(&Utc)),
            added_at: model.added_at.with_timezone(&Utc),
        })
    }

    async fn upsert_daily_rollup(&self, record: &PriceRecord, usd: Decimal) -> Result<(), StoreError> {
        let point = json!([{
            "timestamp": record.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "usd": record.usd,
            "source": record.provenance.as_str(),
        }])
        .to_string();

        let sql = r#"
            INSERT INTO daily_rollups
                (token, network, date, count, first_price, last_price, min_price, max_price, prices)
            VALUES ($1, $2, $3, 1, $4, $4, $4, $4, $5::jsonb)
            ON CONFLICT (token, network, date) DO UPDATE SET
                count = daily_rollups.count + 1,
                last_price = EXCLUDED.last_price,
                min_price = LEAST(daily_rollups.min_price, EXCLUDED.min_price),
                max_price = GREATEST(daily_rollups.max_price, EXCLUDED.max_price),
                prices = daily_rollups.prices || EXCLUDED.prices,
                updated_at = CURRENT_TIMESTAMP
        "#;

        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                sql,
                [
                    record.token.clone().into(),
                    record.network.to_string().into(),
                    record.timestamp.date_naive().into(),
                    usd.into(),
                    point.into(),
                ],
            ))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PriceStore for SqlPriceStore {
    async fn store_price(&self, record: &PriceRecord) -> Result<(), StoreError> {
        let usd = Decimal::from_f64_retain(record.usd)
            .ok_or_else(|| StoreError::InvalidRecord(format!("invalid usd: {}", record.usd)))?;
        let confidence = record
            .interpolation
            .as_ref()
            .and_then(|d| Decimal::from_f64_retain(d.confidence));
        let method = record.interpolation.as_ref().map(|d| {
            match d.method {
                InterpolationMethod::Linear => "linear",
                InterpolationMethod::Extrapolation => "extrapolation",
            }
            .to_string()
        });

        let existing = Prices::find()
            .filter(prices::Column::Token.eq(record.token.as_str()))
            .filter(prices::Column::Network.eq(record.network.as_str()))
            .filter(prices::Column::Timestamp.eq(record.timestamp))
            .one(&self.db)
            .await?;
        let is_new = existing.is_none();

        let sql = r#"
            INSERT INTO prices
                (token, network, timestamp, usd, last_updated, symbol, name, decimals,
                 total_supply, logo_uri, interpolated, interpolation_method, confidence)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (token, network, timestamp) DO UPDATE SET
                usd = EXCLUDED.usd,
                last_updated = EXCLUDED.last_updated,
                symbol = COALESCE(EXCLUDED.symbol, prices.symbol),
                name = COALESCE(EXCLUDED.name, prices.name),
                decimals = COALESCE(EXCLUDED.decimals, prices.decimals),
                total_supply = COALESCE(EXCLUDED.total_supply, prices.total_supply),
                logo_uri = COALESCE(EXCLUDED.logo_uri, prices.logo_uri),
                interpolated = EXCLUDED.interpolated,
                interpolation_method = EXCLUDED.interpolation_method,
                confidence = EXCLUDED.confidence
            WHERE prices.interpolated OR NOT EXCLUDED.interpolated
        "#;

        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                sql,
                [
                    record.token.clone().into(),
                    record.network.to_string().into(),
                    record.timestamp.into(),
                    usd.into(),
                    record.last_updated.into(),
                    record.symbol.clone().into(),
                    record.name.clone().into(),
                    record.decimals.into(),
                    record.total_supply.clone().into(),
                    record.logo_uri.clone().into(),
                    record.is_interpolated().into(),
                    method.into(),
                    confidence.into(),
                ],
            ))
            .await?;

        // Only fresh inserts extend the rollup; replacing a row for the same
        // key must not double-count the day.
        if is_new {
            self.upsert_daily_rollup(record, usd).await?;
        }

        Ok(())
    }

    async fn get_price(
        &self,
        token: &str,
        network: Network,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Option<PriceRecord>, StoreError> {
        let mut query = Prices::find()
            .filter(prices::Column::Token.eq(token.to_lowercase()))
            .filter(prices::Column::Network.eq(network.as_str()));

        query = match timestamp {
            Some(ts) => query.filter(prices::Column::Timestamp.eq(ts)),
            None => query.order_by(prices::Column::Timestamp, Order::Desc),
        };

        match query.one(&self.db).await? {
            Some(model) => Ok(Some(Self::model_to_record(model)?)),
            None => Ok(None),
        }
    }

    async fn get_nearest_prices(
        &self,
        token: &str,
        network: Network,
        target: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PriceRecord>, StoreError> {
        let half = (limit / 2).max(1) as u64;
        let token = token.to_lowercase();

        let before = Prices::find()
            .filter(prices::Column::Token.eq(token.as_str()))
            .filter(prices::Column::Network.eq(network.as_str()))
            .filter(prices::Column::Interpolated.eq(false))
            .filter(prices::Column::Timestamp.lt(target))
            .order_by(prices::Column::Timestamp, Order::Desc)
            .limit(half)
            .all(&self.db)
            .await?;

        let after = Prices::find()
            .filter(prices::Column::Token.eq(token.as_str()))
            .filter(prices::Column::Network.eq(network.as_str()))
            .filter(prices::Column::Interpolated.eq(false))
            .filter(prices::Column::Timestamp.gt(target))
            .order_by(prices::Column::Timestamp, Order::Asc)
            .limit(half)
            .all(&self.db)
            .await?;

        let mut records: Vec<PriceRecord> = before
            .into_iter()
            .chain(after)
            .map(Self::model_to_record)
            .collect::<Result<_, _>>()?;
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }

    async fn get_price_history(
        &self,
        token: &str,
        network: Network,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>, StoreError> {
        let models = Prices::find()
            .filter(prices::Column::Token.eq(token.to_lowercase()))
            .filter(prices::Column::Network.eq(network.as_str()))
            .filter(prices::Column::Timestamp.gte(start))
            .filter(prices::Column::Timestamp.lte(end))
            .order_by(prices::Column::Timestamp, Order::Asc)
            .all(&self.db)
            .await?;

        models.into_iter().map(Self::model_to_record).collect()
    }

    async fn add_token(
        &self,
        token: &str,
        network: Network,
        creation_date: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let sql = r#"
            INSERT INTO tokens (token, network, creation_date, added_at)
            VALUES ($1, $2, $3, CURRENT_TIMESTAMP)
            ON CONFLICT (token, network) DO UPDATE SET
                creation_date = COALESCE(EXCLUDED.creation_date, tokens.creation_date)
        "#;
        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                sql,
                [
                    token.to_lowercase().into(),
                    network.to_string().into(),
                    creation_date.into(),
                ],
            ))
            .await?;
        Ok(())
    }

    async fn get_token(
        &self,
        token: &str,
        network: Network,
    ) -> Result<Option<TokenEntry>, StoreError> {
        let model = Tokens::find()
            .filter(tokens::Column::Token.eq(token.to_lowercase()))
            .filter(tokens::Column::Network.eq(network.as_str()))
            .one(&self.db)
            .await?;

        match model {
            Some(model) => Ok(Some(Self::token_model_to_entry(model)?)),
            None => Ok(None),
        }
    }

    async fn get_all_tokens(&self) -> Result<Vec<TokenEntry>, StoreError> {
        let models = Tokens::find().all(&self.db).await?;
        models.into_iter().map(Self::token_model_to_entry).collect()
    }

    async fn archive_older_than(&self, days: i64) -> Result<ArchiveReport, StoreError> {
        let cutoff = Utc::now() - Duration::days(days);
        let txn = self.db.begin().await?;

        let copy_sql = r#"
            INSERT INTO archived_prices
                (token, network, timestamp, usd, last_updated, symbol, name, decimals,
                 total_supply, logo_uri, interpolated, interpolation_method, confidence,
                 created_at, archived_at)
            SELECT token, network, timestamp, usd, last_updated, symbol, name, decimals,
                   total_supply, logo_uri, interpolated, interpolation_method, confidence,
                   created_at, CURRENT_TIMESTAMP
            FROM prices
            WHERE created_at < $1
        "#;
        let copied = txn
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                copy_sql,
                [cutoff.into()],
            ))
            .await?
            .rows_affected();

        txn.execute(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            "DELETE FROM prices WHERE created_at < $1",
            [cutoff.into()],
        ))
        .await?;

        txn.commit().await?;

        tracing::info!(archived = copied, cutoff = %cutoff, "archived old price rows");
        Ok(ArchiveReport { archived: copied })
    }

    async fn purge_cache_stats_older_than(&self, days: i64) -> Result<u64, StoreError> {
        let cutoff = (Utc::now() - Duration::days(days)).date_naive();
        let result = CacheStats::delete_many()
            .filter(cache_stats::Column::Date.lt(cutoff))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn record_cache_stat(&self, op: CacheOp, strategy: &str) -> Result<(), StoreError> {
        let today = Utc::now().date_naive();
        let (hit, miss, set, delete) = match op {
            CacheOp::Hit => (1i64, 0i64, 0i64, 0i64),
            CacheOp::Miss => (0, 1, 0, 0),
            CacheOp::Set => (0, 0, 1, 0),
            CacheOp::Delete => (0, 0, 0, 1),
        };
        let strategy_key = format!("{}:{}", strategy, op.as_str());
        let initial = json!({ &strategy_key: 1 }).to_string();

        let sql = r#"
            INSERT INTO cache_stats (date, hit, miss, set_ops, delete_ops, total, by_strategy)
            VALUES ($1, $2, $3, $4, $5, 1, $6::jsonb)
            ON CONFLICT (date) DO UPDATE SET
                hit = cache_stats.hit + EXCLUDED.hit,
                miss = cache_stats.miss + EXCLUDED.miss,
                set_ops = cache_stats.set_ops + EXCLUDED.set_ops,
                delete_ops = cache_stats.delete_ops + EXCLUDED.delete_ops,
                total = cache_stats.total + 1,
                by_strategy = jsonb_set(
                    cache_stats.by_strategy,
                    ARRAY[$7],
                    (COALESCE(cache_stats.by_strategy->>$7, '0')::bigint + 1)::text::jsonb
                ),
                updated_at = CURRENT_TIMESTAMP
        "#;

        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                sql,
                [
                    today.into(),
                    hit.into(),
                    miss.into(),
                    set.into(),
                    delete.into(),
                    initial.into(),
                    strategy_key.into(),
                ],
            ))
            .await?;
        Ok(())
    }

    async fn get_cache_stats(
        &self,
        date: NaiveDate,
    ) -> Result<Option<CacheStatsBucket>, StoreError> {
        let model = CacheStats::find()
            .filter(cache_stats::Column::Date.eq(date))
            .one(&self.db)
            .await?;

        Ok(model.map(|m| CacheStatsBucket {
            date: m.date,
            hit: m.hit,
            miss: m.miss,
            set_ops: m.set_ops,
            delete_ops: m.delete_ops,
            total: m.total,
            by_strategy: m.by_strategy,
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.ping().await.map_err(Into::into)
    }
}
