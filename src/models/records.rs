//! Records produced by a price cycle and persisted by the document store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::catalog::{Capacity, Catalog, Series};
use super::price::Price;

/// Seconds in one retention day.
pub const SECS_PER_DAY: i64 = 86_400;

/// Aggregated buy-back price for one (series, capacity) key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentPriceRecord {
    pub series: Series,
    pub capacity: Capacity,
    /// Lowest observed price per color.
    pub colors: BTreeMap<String, Price>,
    pub kaitori_price_min: Price,
    pub kaitori_price_max: Price,
    /// Vendor id, or `multi` when several vendors contributed.
    pub source: String,
    pub updated_at: DateTime<Utc>,
}

impl CurrentPriceRecord {
    pub fn to_document(&self, catalog: &Catalog) -> CurrentPriceDocument {
        CurrentPriceDocument {
            series: catalog.name(self.series),
            capacity: self.capacity.as_str().to_string(),
            colors: colors_to_plain(&self.colors),
            kaitori_price_min: self.kaitori_price_min.get(),
            kaitori_price_max: self.kaitori_price_max.get(),
            source: self.source.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Surrogate id assigned by the store to a history record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HistoryId(pub String);

impl std::fmt::Display for HistoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Append-only snapshot of a current price record at cycle time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub series: Series,
    pub capacity: Capacity,
    pub colors: BTreeMap<String, Price>,
    pub price_min: Price,
    pub price_max: Price,
    pub source: String,
    /// Epoch seconds.
    pub timestamp: i64,
    pub date: NaiveDate,
    /// Epoch seconds after which the record is eligible for sweeping.
    pub expiration_time: i64,
}

impl HistoryRecord {
    pub fn from_current(record: &CurrentPriceRecord, retention_days: u32) -> Self {
        let timestamp = record.updated_at.timestamp();
        HistoryRecord {
            series: record.series,
            capacity: record.capacity,
            colors: record.colors.clone(),
            price_min: record.kaitori_price_min,
            price_max: record.kaitori_price_max,
            source: record.source.clone(),
            timestamp,
            date: record.updated_at.date_naive(),
            expiration_time: timestamp + i64::from(retention_days) * SECS_PER_DAY,
        }
    }

    /// Midpoint of min and max, truncated.
    pub fn price_avg(&self) -> i64 {
        (self.price_min.get() + self.price_max.get()) / 2
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredHistory {
    pub id: HistoryId,
    pub record: HistoryRecord,
}

/// Wire shape of a current price record, as written to the object-store mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentPriceDocument {
    pub series: String,
    pub capacity: String,
    #[serde(default)]
    pub colors: BTreeMap<String, i64>,
    pub kaitori_price_min: i64,
    pub kaitori_price_max: i64,
    pub source: String,
    pub updated_at: DateTime<Utc>,
}

pub fn colors_to_plain(colors: &BTreeMap<String, Price>) -> BTreeMap<String, i64> {
    colors.iter().map(|(k, v)| (k.clone(), v.get())).collect()
}

/// Parse a color map, rejecting any entry whose price is out of range.
pub fn colors_from_plain(colors: &BTreeMap<String, i64>) -> Option<BTreeMap<String, Price>> {
    colors
        .iter()
        .map(|(k, v)| Price::new(*v).ok().map(|p| (k.clone(), p)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> CurrentPriceRecord {
        CurrentPriceRecord {
            series: Series::Pro,
            capacity: Capacity::Gb256,
            colors: BTreeMap::from([
                ("Black".to_string(), Price::new(150_000).unwrap()),
                ("White".to_string(), Price::new(152_000).unwrap()),
            ]),
            kaitori_price_min: Price::new(150_000).unwrap(),
            kaitori_price_max: Price::new(152_000).unwrap(),
            source: "kaitori-rudea".to_string(),
            updated_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_history_from_current_sets_expiration() {
        let history = HistoryRecord::from_current(&sample(), 30);
        assert_eq!(history.expiration_time - history.timestamp, 30 * SECS_PER_DAY);
        assert_eq!(history.date.to_string(), "2025-03-01");
        assert_eq!(history.price_avg(), 151_000);
    }

    #[test]
    fn test_document_uses_display_names() {
        let doc = sample().to_document(&Catalog::default());
        assert_eq!(doc.series, "iPhone 16 Pro");
        assert_eq!(doc.capacity, "256GB");
        assert_eq!(doc.colors["Black"], 150_000);
    }
}
