use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Prices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Prices::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Prices::Token).string().not_null())
                    .col(ColumnDef::new(Prices::Network).string().not_null())
                    .col(
                        ColumnDef::new(Prices::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Prices::Usd).decimal().not_null())
                    .col(
                        ColumnDef::new(Prices::LastUpdated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Prices::Symbol).string().null())
                    .col(ColumnDef::new(Prices::Name).string().null())
                    .col(ColumnDef::new(Prices::Decimals).integer().null())
                    .col(ColumnDef::new(Prices::TotalSupply).string().null())
                    .col(ColumnDef::new(Prices::LogoUri).string().null())
                    .col(
                        ColumnDef::new(Prices::Interpolated)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Prices::InterpolationMethod).string().null())
                    .col(ColumnDef::new(Prices::Confidence).decimal().null())
                    .col(
                        ColumnDef::new(Prices::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        // One live row per (token, network, timestamp)
        manager
            .create_index(
                Index::create()
                    .name("idx_prices_token_network_timestamp")
                    .table(Prices::Table)
                    .col(Prices::Token)
                    .col(Prices::Network)
                    .col(Prices::Timestamp)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Point lookups by pair
        manager
            .create_index(
                Index::create()
                    .name("idx_prices_token_network")
                    .table(Prices::Table)
                    .col(Prices::Token)
                    .col(Prices::Network)
                    .to_owned(),
            )
            .await?;

        // Range queries
        manager
            .create_index(
                Index::create()
                    .name("idx_prices_timestamp")
                    .table(Prices::Table)
                    .col(Prices::Timestamp)
                    .to_owned(),
            )
            .await?;

        // Analytics over price values
        manager
            .create_index(
                Index::create()
                    .name("idx_prices_usd")
                    .table(Prices::Table)
                    .col(Prices::Usd)
                    .to_owned(),
            )
            .await?;

        // Retention sweeps scan by creation time
        manager
            .create_index(
                Index::create()
                    .name("idx_prices_created_at")
                    .table(Prices::Table)
                    .col(Prices::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Prices::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Prices {
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
}
