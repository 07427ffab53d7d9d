pub use sea_orm_migration::prelude::*;

mod m20260310_000001_create_prices;
mod m20260310_000002_create_daily_rollups;
mod m20260310_000003_create_tokens;
mod m20260310_000004_create_cache_stats;
mod m20260310_000005_create_archived_prices;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260310_000001_create_prices::Migration),
            Box::new(m20260310_000002_create_daily_rollups::Migration),
            Box::new(m20260310_000003_create_tokens::Migration),
            Box::new(m20260310_000004_create_cache_stats::Migration),
            Box::new(m20260310_000005_create_archived_prices::Migration),
        ]
    }
}
