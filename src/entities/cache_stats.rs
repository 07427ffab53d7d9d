//! SeaORM Entity for daily cache operation counters

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cache_stats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// UTC day the bucket covers
    pub date: Date,
    pub hit: i64,
    pub miss: i64,
    pub set_ops: i64,
    pub delete_ops: i64,
    pub total: i64,
    /// Per-strategy operation counters
    pub by_strategy: Json,
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
