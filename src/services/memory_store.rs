//! In-process document store
//!
//! Backs local runs without a database and the test suites. Every operation
//! takes the lock once, so per-key writes are atomic.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::store::DocumentStore;
use crate::error::StoreError;
use crate::models::catalog::{Capacity, Series};
use crate::models::official::OfficialPriceDoc;
use crate::models::records::{CurrentPriceRecord, HistoryId, HistoryRecord, StoredHistory};

#[derive(Default)]
pub struct MemoryStore {
    current: RwLock<BTreeMap<(Series, Capacity), CurrentPriceRecord>>,
    history: RwLock<BTreeMap<u64, HistoryRecord>>,
    official: RwLock<BTreeMap<String, OfficialPriceDoc>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }

    /// All history records, oldest id first.
    pub fn history_snapshot(&self) -> Vec<HistoryRecord> {
        self.history.read().values().cloned().collect()
    }
}

fn parse_id(id: &HistoryId) -> Result<u64, StoreError> {
    id.0.parse()
        .map_err(|_| StoreError::Backend(format!("malformed history id '{}'", id)))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert_current(&self, record: &CurrentPriceRecord) -> Result<(), StoreError> {
        self.current
            .write()
            .insert((record.series, record.capacity), record.clone());
        Ok(())
    }

    async fn current_for_series(&self, series: Series) -> Result<Vec<CurrentPriceRecord>, StoreError> {
        Ok(self
            .current
            .read()
            .values()
            .filter(|r| r.series == series)
            .cloned()
            .collect())
    }

    async fn all_current(&self) -> Result<Vec<CurrentPriceRecord>, StoreError> {
        Ok(self.current.read().values().cloned().collect())
    }

    async fn wipe_current(&self) -> Result<u64, StoreError> {
        let mut current = self.current.write();
        let n = current.len() as u64;
        current.clear();
        Ok(n)
    }

    async fn official_prices(&self) -> Result<Vec<OfficialPriceDoc>, StoreError> {
        Ok(self.official.read().values().cloned().collect())
    }

    async fn replace_official(&self, docs: &[OfficialPriceDoc]) -> Result<(), StoreError> {
        let mut official = self.official.write();
        for doc in docs {
            official.insert(doc.id.clone(), doc.clone());
        }
        Ok(())
    }

    async fn append_history(&self, record: &HistoryRecord) -> Result<HistoryId, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.history.write().insert(id, record.clone());
        Ok(HistoryId(id.to_string()))
    }

    async fn history_for(
        &self,
        series: Series,
        capacity: Capacity,
        since: i64,
    ) -> Result<Vec<StoredHistory>, StoreError> {
        let mut rows: Vec<StoredHistory> = self
            .history
            .read()
            .iter()
            .filter(|(_, r)| r.series == series && r.capacity == capacity && r.timestamp >= since)
            .map(|(id, r)| StoredHistory {
                id: HistoryId(id.to_string()),
                record: r.clone(),
            })
            .collect();
        rows.sort_by_key(|h| h.record.timestamp);
        Ok(rows)
    }

    async fn history_older_than(&self, cutoff: i64) -> Result<Vec<HistoryId>, StoreError> {
        Ok(self
            .history
            .read()
            .iter()
            .filter(|(_, r)| r.timestamp < cutoff)
            .map(|(id, _)| HistoryId(id.to_string()))
            .collect())
    }

    async fn delete_history(&self, id: &HistoryId) -> Result<(), StoreError> {
        let key = parse_id(id)?;
        self.history.write().remove(&key);
        Ok(())
    }
}
