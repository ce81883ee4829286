use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;

use kaitori_tracker::config::{AppConfig, RuntimeEnv};
use kaitori_tracker::handlers;
use kaitori_tracker::jobs::price_cycle::{
    shutdown_on_ctrl_c, start_price_cycle_job, wait_for_shutdown, PriceCycle,
};
use kaitori_tracker::scrapers::browser::HttpBrowser;
use kaitori_tracker::services::mirror::object_store_from_config;
use kaitori_tracker::services::sea_orm_store::SeaOrmStore;
use kaitori_tracker::services::store::DocumentStore;
use kaitori_tracker::telemetry::init_tracing;
use kaitori_tracker::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        tracing::error!(error = %e, "Server failed");
        eprintln!("kaitori-tracker: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BoxError> {
    // Load configuration (also reads .env)
    let config = AppConfig::load()?;
    init_tracing(config.app.log_level);
    let runtime = RuntimeEnv::from_env()?;

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(runtime.require_database_url()?).await?;

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None).await?;

    let catalog = config.catalog();
    let store: Arc<dyn DocumentStore> = Arc::new(SeaOrmStore::new(db, catalog.clone()));
    let objects = object_store_from_config(&config.storage, runtime.bucket_name.as_deref())?;

    let shutdown = shutdown_on_ctrl_c();

    let mut job = None;
    if let Some(every) = runtime.cycle_interval {
        let engine = Arc::new(HttpBrowser::new(&config.scraper.user_agent)?);
        let mut cycle = PriceCycle::from_config(&config, engine, store.clone())?;
        if let Some(objects) = objects.clone() {
            cycle = cycle.with_mirror(objects, catalog.clone());
        }
        job = start_price_cycle_job(Arc::new(cycle), every, shutdown.clone());
    }

    let state = AppState::new(store, catalog, runtime.app_env.clone(), objects.is_some());
    let app = handlers::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", runtime.port)).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    let mut stop = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { wait_for_shutdown(&mut stop).await })
        .await?;

    if let Some(job) = job {
        job.await?;
    }
    Ok(())
}
