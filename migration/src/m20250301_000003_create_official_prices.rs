use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Document id is the series name
        manager
            .create_table(
                Table::create()
                    .table(OfficialPrices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OfficialPrices::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OfficialPrices::Price).json_binary().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OfficialPrices::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum OfficialPrices {
    Table,
    Id,
    Price,
}
