use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CurrentPrices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CurrentPrices::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CurrentPrices::Series).string_len(64).not_null())
                    .col(ColumnDef::new(CurrentPrices::Capacity).string_len(8).not_null())
                    .col(ColumnDef::new(CurrentPrices::Colors).json_binary().not_null())
                    .col(
                        ColumnDef::new(CurrentPrices::KaitoriPriceMin)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CurrentPrices::KaitoriPriceMax)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CurrentPrices::Source).string_len(128).not_null())
                    .col(
                        ColumnDef::new(CurrentPrices::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // One document per (series, capacity); upserts target this constraint
        manager
            .create_index(
                Index::create()
                    .name("idx_current_prices_series_capacity")
                    .table(CurrentPrices::Table)
                    .col(CurrentPrices::Series)
                    .col(CurrentPrices::Capacity)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CurrentPrices::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum CurrentPrices {
    Table,
    Id,
    Series,
    Capacity,
    Colors,
    KaitoriPriceMin,
    KaitoriPriceMax,
    Source,
    UpdatedAt,
}
