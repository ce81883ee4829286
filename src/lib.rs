// src/lib.rs

use moka::future::Cache;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use models::catalog::Catalog;
use services::store::DocumentStore;

/// Official prices are cached as long as clients are told to cache them.
pub const OFFICIAL_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub catalog: Catalog,
    pub official_cache: Cache<&'static str, Value>,
    pub environment: String,
    pub storage_configured: bool,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        catalog: Catalog,
        environment: impl Into<String>,
        storage_configured: bool,
    ) -> Self {
        let official_cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(OFFICIAL_CACHE_TTL)
            .build();

        Self {
            store,
            catalog,
            official_cache,
            environment: environment.into(),
            storage_configured,
        }
    }
}

pub mod config;
pub mod error;
pub mod telemetry;

pub mod models {
    pub mod catalog;
    pub mod health;
    pub mod history;
    pub mod official;
    pub mod price;
    pub mod prices;
    pub mod records;
}

pub mod entities {
    pub mod prelude;
    pub mod current_prices;
    pub mod official_prices;
    pub mod price_history;
}

pub mod scrapers;

pub mod services {
    pub mod aggregator;
    pub mod history;
    pub mod memory_store;
    pub mod mirror;
    pub mod reload;
    pub mod retention;
    pub mod sea_orm_store;
    pub mod store;
}

pub mod jobs {
    pub mod price_cycle;
}

pub mod handlers;
