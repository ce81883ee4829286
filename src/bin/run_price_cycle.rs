//! Single-shot price cycle, meant to be started by an external timer.
//!
//! Exit codes: 0 on success (per-URL failures included), 1 on fatal errors.

use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::process::ExitCode;
use std::sync::Arc;

use kaitori_tracker::config::{AppConfig, LogLevel, RuntimeEnv};
use kaitori_tracker::jobs::price_cycle::{shutdown_on_ctrl_c, PriceCycle};
use kaitori_tracker::scrapers::browser::HttpBrowser;
use kaitori_tracker::services::mirror::object_store_from_config;
use kaitori_tracker::services::sea_orm_store::SeaOrmStore;
use kaitori_tracker::telemetry::init_tracing;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogLevel::Info);
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.app.log_level);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Price cycle aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<(), BoxError> {
    let runtime = RuntimeEnv::from_env()?;

    tracing::info!("Connecting to database...");
    let db = Database::connect(runtime.require_database_url()?).await?;
    migration::Migrator::up(&db, None).await?;

    let catalog = config.catalog();
    let store = Arc::new(SeaOrmStore::new(db, catalog.clone()));
    let engine = Arc::new(HttpBrowser::new(&config.scraper.user_agent)?);

    let mut cycle = PriceCycle::from_config(&config, engine, store)?;
    if let Some(objects) = object_store_from_config(&config.storage, runtime.bucket_name.as_deref())? {
        cycle = cycle.with_mirror(objects, catalog);
    }

    let summary = cycle.run(shutdown_on_ctrl_c()).await?;
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
