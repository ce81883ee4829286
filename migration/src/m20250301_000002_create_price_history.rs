use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PriceHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PriceHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PriceHistory::Series).string_len(64).not_null())
                    .col(ColumnDef::new(PriceHistory::Capacity).string_len(8).not_null())
                    .col(ColumnDef::new(PriceHistory::Colors).json_binary().not_null())
                    .col(
                        ColumnDef::new(PriceHistory::KaitoriPriceMin)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PriceHistory::KaitoriPriceMax)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PriceHistory::Source).string_len(128).not_null())
                    // Epoch seconds
                    .col(ColumnDef::new(PriceHistory::Timestamp).big_integer().not_null())
                    .col(ColumnDef::new(PriceHistory::Date).date().not_null())
                    .col(
                        ColumnDef::new(PriceHistory::ExpirationTime)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PriceHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await?;

        // Read path: (series, capacity) slice filtered by timestamp
        manager
            .create_index(
                Index::create()
                    .name("idx_price_history_series_capacity_time")
                    .table(PriceHistory::Table)
                    .col(PriceHistory::Series)
                    .col(PriceHistory::Capacity)
                    .col(PriceHistory::Timestamp)
                    .to_owned(),
            )
            .await?;

        // Sweep path
        manager
            .create_index(
                Index::create()
                    .name("idx_price_history_time")
                    .table(PriceHistory::Table)
                    .col(PriceHistory::Timestamp)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PriceHistory::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PriceHistory {
    Table,
    Id,
    Series,
    Capacity,
    Colors,
    KaitoriPriceMin,
    KaitoriPriceMax,
    Source,
    Timestamp,
    Date,
    ExpirationTime,
    CreatedAt,
}
