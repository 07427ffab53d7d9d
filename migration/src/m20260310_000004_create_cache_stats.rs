use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CacheStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CacheStats::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CacheStats::Date).date().not_null())
                    .col(
                        ColumnDef::new(CacheStats::Hit)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CacheStats::Miss)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CacheStats::SetOps)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CacheStats::DeleteOps)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CacheStats::Total)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CacheStats::ByStrategy)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CacheStats::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        // One bucket per UTC day
        manager
            .create_index(
                Index::create()
                    .name("idx_cache_stats_date")
                    .table(CacheStats::Table)
                    .col(CacheStats::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CacheStats::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CacheStats {
    Table,
    Id,
    Date,
    Hit,
    Miss,
    SetOps,
    DeleteOps,
    Total,
    ByStrategy,
    UpdatedAt,
}
