//! Offline reset and reload of the current-prices collection.
//!
//! This is the only code path that wipes `current_prices`. Every snapshot
//! entry is validated with the same catalog and price rules as the cycle
//! before anything is deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::store::DocumentStore;
use crate::error::ReloadError;
use crate::models::catalog::{Capacity, Catalog};
use crate::models::official::OfficialPriceDoc;
use crate::models::price::Price;
use crate::models::records::{colors_from_plain, colors_to_plain, CurrentPriceRecord};

const DEFAULT_SOURCE: &str = "kaitori-rudea";

/// `{series: {capacity: entry}}`
pub type KaitoriSnapshot = BTreeMap<String, BTreeMap<String, SnapshotEntry>>;

/// `{series: {price: {...}}}`
pub type OfficialSnapshot = BTreeMap<String, OfficialSnapshotEntry>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    #[serde(default)]
    pub colors: BTreeMap<String, i64>,
    pub kaitori_price_min: i64,
    pub kaitori_price_max: i64,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficialSnapshotEntry {
    pub price: Value,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReloadStats {
    pub wiped: u64,
    pub loaded: u64,
    pub official_loaded: u64,
}

/// Validate a snapshot into records stamped with `updated_at`.
pub fn records_from_snapshot(
    snapshot: &KaitoriSnapshot,
    catalog: &Catalog,
    updated_at: DateTime<Utc>,
) -> Result<Vec<CurrentPriceRecord>, ReloadError> {
    let mut records = Vec::new();

    for (series_name, capacities) in snapshot {
        for (capacity_raw, entry) in capacities {
            let invalid = |reason: String| ReloadError::InvalidEntry {
                series: series_name.clone(),
                capacity: capacity_raw.clone(),
                reason,
            };

            let series = catalog
                .parse_series(series_name)
                .ok_or_else(|| invalid("unknown series".to_string()))?;
            let capacity: Capacity = capacity_raw.parse().map_err(invalid)?;
            if !series.allows(capacity) {
                return Err(invalid("capacity not sold for this series".to_string()));
            }

            let colors = colors_from_plain(&entry.colors)
                .ok_or_else(|| invalid("color price out of range".to_string()))?;
            let min = Price::new(entry.kaitori_price_min).map_err(|e| invalid(e.to_string()))?;
            let max = Price::new(entry.kaitori_price_max).map_err(|e| invalid(e.to_string()))?;
            if min > max {
                return Err(invalid(format!("min {} exceeds max {}", min, max)));
            }
            if colors.values().any(|p| *p < min || *p > max) {
                return Err(invalid("color price outside [min, max]".to_string()));
            }

            records.push(CurrentPriceRecord {
                series,
                capacity,
                colors,
                kaitori_price_min: min,
                kaitori_price_max: max,
                source: entry.source.clone(),
                updated_at,
            });
        }
    }

    records.sort_by_key(|r| (r.series, r.capacity));
    Ok(records)
}

/// Inverse of [`records_from_snapshot`], used to reload what is currently stored.
pub fn snapshot_from_records(records: &[CurrentPriceRecord], catalog: &Catalog) -> KaitoriSnapshot {
    let mut snapshot = KaitoriSnapshot::new();
    for r in records {
        snapshot.entry(catalog.name(r.series)).or_default().insert(
            r.capacity.as_str().to_string(),
            SnapshotEntry {
                colors: colors_to_plain(&r.colors),
                kaitori_price_min: r.kaitori_price_min.get(),
                kaitori_price_max: r.kaitori_price_max.get(),
                source: r.source.clone(),
            },
        );
    }
    snapshot
}

pub fn official_docs(snapshot: OfficialSnapshot) -> Vec<OfficialPriceDoc> {
    snapshot
        .into_iter()
        .map(|(id, entry)| OfficialPriceDoc { id, price: entry.price })
        .collect()
}

#[derive(Clone)]
pub struct ReloadService {
    store: Arc<dyn DocumentStore>,
}

impl ReloadService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Current contents of the collection, for reloading in place.
    pub async fn current_records(&self) -> Result<Vec<CurrentPriceRecord>, ReloadError> {
        Ok(self.store.all_current().await?)
    }

    /// Wipe `current_prices`, then upsert every record.
    pub async fn reset_and_reload(
        &self,
        records: &[CurrentPriceRecord],
        official: &[OfficialPriceDoc],
    ) -> Result<ReloadStats, ReloadError> {
        let wiped = self.store.wipe_current().await?;
        info!(wiped = wiped, "Wiped current_prices");

        for record in records {
            self.store.upsert_current(record).await?;
        }

        if !official.is_empty() {
            self.store.replace_official(official).await?;
        }

        let stats = ReloadStats {
            wiped,
            loaded: records.len() as u64,
            official_loaded: official.len() as u64,
        };
        info!(
            wiped = stats.wiped,
            loaded = stats.loaded,
            official_loaded = stats.official_loaded,
            "Reset and reload complete"
        );
        Ok(stats)
    }
}
