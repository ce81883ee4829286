//! Offline reset and reload of `current_prices`.
//!
//! Usage:
//!   reset_and_reload [kaitori_snapshot.json] [official_prices.json]
//!
//! Without a snapshot the collection is reloaded from its own contents.
//! Every entry is validated before anything is wiped.

use chrono::Utc;
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use kaitori_tracker::config::{AppConfig, LogLevel, RuntimeEnv};
use kaitori_tracker::error::ReloadError;
use kaitori_tracker::services::reload::{
    official_docs, records_from_snapshot, KaitoriSnapshot, OfficialSnapshot, ReloadService,
};
use kaitori_tracker::services::sea_orm_store::SeaOrmStore;
use kaitori_tracker::telemetry::init_tracing;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ReloadError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ReloadError::Read {
            path: path.display().to_string(),
            source,
        })?;
    Ok(serde_json::from_str(&raw)?)
}

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

    let args: Vec<String> = env::args().skip(1).collect();
    match run(config, args.first().map(String::as_str), args.get(1).map(String::as_str)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Reset and reload failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig, snapshot: Option<&str>, official: Option<&str>) -> Result<(), BoxError> {
    let runtime = RuntimeEnv::from_env()?;

    tracing::info!("Connecting to database...");
    let db = Database::connect(runtime.require_database_url()?).await?;
    migration::Migrator::up(&db, None).await?;

    let catalog = config.catalog();
    let service = ReloadService::new(Arc::new(SeaOrmStore::new(db, catalog.clone())));

    let records = match snapshot {
        Some(path) => {
            tracing::info!(path = %path, "Loading kaitori snapshot");
            let snapshot: KaitoriSnapshot = read_json(Path::new(path)).await?;
            records_from_snapshot(&snapshot, &catalog, Utc::now())?
        }
        None => {
            tracing::info!("No snapshot given, reloading current contents");
            service.current_records().await?
        }
    };

    let official = match official {
        Some(path) => {
            tracing::info!(path = %path, "Loading official prices");
            let snapshot: OfficialSnapshot = read_json(Path::new(path)).await?;
            official_docs(snapshot)
        }
        None => Vec::new(),
    };

    let stats = service.reset_and_reload(&records, &official).await?;
    println!(
        "wiped={} loaded={} official_loaded={}",
        stats.wiped, stats.loaded, stats.official_loaded
    );
    Ok(())
}
