use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DailyRollups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DailyRollups::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DailyRollups::Token).string().not_null())
                    .col(ColumnDef::new(DailyRollups::Network).string().not_null())
                    .col(ColumnDef::new(DailyRollups::Date).date().not_null())
                    .col(
                        ColumnDef::new(DailyRollups::Count)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(DailyRollups::FirstPrice).decimal().not_null())
                    .col(ColumnDef::new(DailyRollups::LastPrice).decimal().not_null())
                    .col(ColumnDef::new(DailyRollups::MinPrice).decimal().not_null())
                    .col(ColumnDef::new(DailyRollups::MaxPrice).decimal().not_null())
                    .col(
                        ColumnDef::new(DailyRollups::Prices)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DailyRollups::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .col(
                        ColumnDef::new(DailyRollups::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        // One rollup per pair per UTC day
        manager
            .create_index(
                Index::create()
                    .name("idx_daily_rollups_token_network_date")
                    .table(DailyRollups::Table)
                    .col(DailyRollups::Token)
                    .col(DailyRollups::Network)
                    .col(DailyRollups::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_daily_rollups_date")
                    .table(DailyRollups::Table)
                    .col(DailyRollups::Date)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DailyRollups::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DailyRollups {
    Table,
    Id,
    Token,
    Network,
    Date,
    Count,
    FirstPrice,
    LastPrice,
    MinPrice,
    MaxPrice,
    Prices,
    CreatedAt,
    UpdatedAt,
}
