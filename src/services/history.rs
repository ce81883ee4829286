//! Price history service
//!
//! Appends one snapshot per aggregated record per cycle and serves the
//! recent slice for one (series, capacity) pair, oldest first.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::store::DocumentStore;
use crate::error::StoreError;
use crate::models::catalog::{Capacity, Series};
use crate::models::records::{CurrentPriceRecord, HistoryId, HistoryRecord, SECS_PER_DAY};

#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn DocumentStore>,
    retention_days: u32,
}

impl HistoryService {
    pub fn new(store: Arc<dyn DocumentStore>, retention_days: u32) -> Self {
        Self {
            store,
            retention_days,
        }
    }

    /// Append a snapshot of `current`; its timestamp is the record's cycle time.
    pub async fn record(&self, current: &CurrentPriceRecord) -> Result<HistoryId, StoreError> {
        let history = HistoryRecord::from_current(current, self.retention_days);
        self.store.append_history(&history).await
    }

    /// Records of the last `days` days, sorted ascending by timestamp.
    pub async fn recent(
        &self,
        series: Series,
        capacity: Capacity,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<HistoryRecord>, StoreError> {
        let since = now.timestamp() - i64::from(days) * SECS_PER_DAY;
        let mut rows: Vec<HistoryRecord> = self
            .store
            .history_for(series, capacity, since)
            .await?
            .into_iter()
            .map(|h| h.record)
            .collect();

        // Backends without a composite index may return scan order
        rows.sort_by_key(|r| r.timestamp);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::price::Price;
    use crate::services::memory_store::MemoryStore;
    use std::collections::BTreeMap;

    fn record_at(ts: i64) -> CurrentPriceRecord {
        CurrentPriceRecord {
            series: Series::Standard,
            capacity: Capacity::Gb128,
            colors: BTreeMap::new(),
            kaitori_price_min: Price::new(60_000).unwrap(),
            kaitori_price_max: Price::new(62_000).unwrap(),
            source: "v".to_string(),
            updated_at: DateTime::from_timestamp(ts, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_recent_is_sorted_and_windowed() {
        let store = Arc::new(MemoryStore::new());
        let history = HistoryService::new(store.clone(), 14);
        let now = DateTime::from_timestamp(1_750_000_000, 0).unwrap();
        let now_ts = now.timestamp();

        for ts in [now_ts - 3_600, now_ts - 20 * SECS_PER_DAY, now_ts - 2 * SECS_PER_DAY, now_ts - 60] {
            history.record(&record_at(ts)).await.unwrap();
        }

        let rows = history.recent(Series::Standard, Capacity::Gb128, 7, now).await.unwrap();
        let timestamps: Vec<i64> = rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![now_ts - 2 * SECS_PER_DAY, now_ts - 3_600, now_ts - 60]);
        assert!(rows.iter().all(|r| r.expiration_time == r.timestamp + 14 * SECS_PER_DAY));
    }

    #[tokio::test]
    async fn test_same_day_cycles_are_kept() {
        let store = Arc::new(MemoryStore::new());
        let history = HistoryService::new(store.clone(), 14);
        let ts = 1_750_000_000;
        history.record(&record_at(ts)).await.unwrap();
        history.record(&record_at(ts + 60)).await.unwrap();
        assert_eq!(store.history_len(), 2);
    }
}
