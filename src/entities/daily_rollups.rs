//! SeaORM Entity for per-day price aggregates

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "daily_rollups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub token: String,
    pub network: String,
    /// UTC day the aggregate covers
    pub date: Date,
    pub count: i32,
    pub first_price: Decimal,
    pub last_price: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
    /// Append-only list of {timestamp, usd, source}
    pub prices: Json,
    pub created_at: Option<DateTimeWithTimeZone>,
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
