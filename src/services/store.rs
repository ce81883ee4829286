//! Document store capability shared by the cycle and the Read API.
//!
//! Collections: `current_prices` (one document per (series, capacity)),
//! `price_history` (append-only, surrogate ids) and `official_prices`
//! (one document per series name, maintained out-of-band).

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::catalog::{Capacity, Series};
use crate::models::official::OfficialPriceDoc;
use crate::models::records::{CurrentPriceRecord, HistoryId, HistoryRecord, StoredHistory};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Cheap connectivity probe.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Atomic, idempotent write of the record for its (series, capacity) key.
    async fn upsert_current(&self, record: &CurrentPriceRecord) -> Result<(), StoreError>;

    async fn current_for_series(&self, series: Series) -> Result<Vec<CurrentPriceRecord>, StoreError>;

    async fn all_current(&self) -> Result<Vec<CurrentPriceRecord>, StoreError>;

    /// Remove every current price document. Offline reset only.
    async fn wipe_current(&self) -> Result<u64, StoreError>;

    async fn official_prices(&self) -> Result<Vec<OfficialPriceDoc>, StoreError>;

    /// Insert or overwrite official documents by id.
    async fn replace_official(&self, docs: &[OfficialPriceDoc]) -> Result<(), StoreError>;

    async fn append_history(&self, record: &HistoryRecord) -> Result<HistoryId, StoreError>;

    /// History for one key with `timestamp >= since`, ascending by timestamp.
    async fn history_for(
        &self,
        series: Series,
        capacity: Capacity,
        since: i64,
    ) -> Result<Vec<StoredHistory>, StoreError>;

    /// Ids of history records with `timestamp < cutoff`.
    async fn history_older_than(&self, cutoff: i64) -> Result<Vec<HistoryId>, StoreError>;

    async fn delete_history(&self, id: &HistoryId) -> Result<(), StoreError>;
}
