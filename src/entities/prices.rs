//! SeaORM Entity for live price observations

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "prices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Lowercase 0x + 40 hex chars
    pub token: String,
    pub network: String,
    pub timestamp: DateTimeWithTimeZone,
    pub usd: Decimal,
    pub last_updated: DateTimeWithTimeZone,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub decimals: Option<i32>,
    pub total_supply: Option<String>,
    pub logo_uri: Option<String>,
    /// True when synthesized by the interpolation engine
    pub interpolated: bool,
    /// 'linear' or 'extrapolation' when interpolated
    pub interpolation_method: Option<String>,
    pub confidence: Option<Decimal>,
    pub created_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
