//! SeaORM Entity for archived price observations

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "archived_prices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
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
    pub interpolated: bool,
    pub interpolation_method: Option<String>,
    pub confidence: Option<Decimal>,
    pub created_at: Option<DateTimeWithTimeZone>,
    pub archived_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
