use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ArchivedPrices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ArchivedPrices::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ArchivedPrices::Token).string().not_null())
                    .col(ColumnDef::new(ArchivedPrices::Network).string().not_null())
                    .col(
                        ColumnDef::new(ArchivedPrices::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ArchivedPrices::Usd).decimal().not_null())
                    .col(
                        ColumnDef::new(ArchivedPrices::LastUpdated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ArchivedPrices::Symbol).string().null())
                    .col(ColumnDef::new(ArchivedPrices::Name).string().null())
                    .col(ColumnDef::new(ArchivedPrices::Decimals).integer().null())
                    .col(ColumnDef::new(ArchivedPrices::TotalSupply).string().null())
                    .col(ColumnDef::new(ArchivedPrices::LogoUri).string().null())
                    .col(
                        ColumnDef::new(ArchivedPrices::Interpolated)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ArchivedPrices::InterpolationMethod)
                            .string()
                            .null(),
                    )
                    .col(ColumnDef::new(ArchivedPrices::Confidence).decimal().null())
                    .col(
                        ColumnDef::new(ArchivedPrices::CreatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ArchivedPrices::ArchivedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_archived_prices_token_network_timestamp")
                    .table(ArchivedPrices::Table)
                    .col(ArchivedPrices::Token)
                    .col(ArchivedPrices::Network)
                    .col(ArchivedPrices::Timestamp)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ArchivedPrices::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ArchivedPrices {
    Table,
    Id,
    Token,
    Network,
    Timestamp,
    Usd,
    LastUpdated,
    Symbol,
    Name,
    Decimals,
    TotalSupply,
    LogoUri,
    Interpolated,
    InterpolationMethod,
    Confidence,
    CreatedAt,
    ArchivedAt,
}
