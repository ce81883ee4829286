pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_current_prices;
mod m20250301_000002_create_price_history;
mod m20250301_000003_create_official_prices;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_current_prices::Migration),
            Box::new(m20250301_000002_create_price_history::Migration),
            Box::new(m20250301_000003_create_official_prices::Migration),
        ]
    }
}
