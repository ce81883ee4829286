//! Object-store mirror
//!
//! After a cycle's writes, the aggregated records are mirrored as date-keyed
//! JSON objects:
//! - `prices/YYYY/MM/DD/prices.json`: flat array of records
//! - `history/YYYY/MM/DD/history.json`: `{timestamp, prices: [...]}`
//!
//! `MirrorRetention` deletes objects whose date prefix is older than the
//! retention window and moves older objects to the `NEARLINE` class.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::error::{ConfigError, MirrorError};
use crate::models::catalog::Catalog;
use crate::models::records::{CurrentPriceDocument, CurrentPriceRecord};

const PRICES_PREFIX: &str = "prices";
const HISTORY_PREFIX: &str = "history";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClass {
    Standard,
    Nearline,
}

impl StorageClass {
    pub const ALL: [StorageClass; 2] = [StorageClass::Standard, StorageClass::Nearline];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageClass::Standard => "STANDARD",
            StorageClass::Nearline => "NEARLINE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub storage_class: StorageClass,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write (or overwrite) an object in the `STANDARD` class.
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), MirrorError>;

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, MirrorError>;

    async fn delete(&self, key: &str) -> Result<(), MirrorError>;

    async fn set_storage_class(&self, key: &str, class: StorageClass) -> Result<(), MirrorError>;
}

/// Filesystem bucket: `<root>/<STORAGE_CLASS>/<key>`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

fn io_err(path: &Path, source: std::io::Error) -> MirrorError {
    MirrorError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl FsObjectStore {
    pub fn new(mirror_root: impl Into<PathBuf>, bucket: &str) -> Self {
        Self {
            root: mirror_root.into().join(bucket),
        }
    }

    fn path_for(&self, class: StorageClass, key: &str) -> PathBuf {
        self.root.join(class.as_str()).join(key)
    }

    async fn locate(&self, key: &str) -> Option<(StorageClass, PathBuf)> {
        for class in StorageClass::ALL {
            let path = self.path_for(class, key);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Some((class, path));
            }
        }
        None
    }

    async fn write_file(path: &Path, body: &[u8]) -> Result<(), MirrorError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }
        tokio::fs::write(path, body).await.map_err(|e| io_err(path, e))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), MirrorError> {
        let stale = self.path_for(StorageClass::Nearline, key);
        if tokio::fs::try_exists(&stale).await.unwrap_or(false) {
            tokio::fs::remove_file(&stale).await.map_err(|e| io_err(&stale, e))?;
        }
        Self::write_file(&self.path_for(StorageClass::Standard, key), &body).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, MirrorError> {
        let mut objects = Vec::new();

        for class in StorageClass::ALL {
            let class_root = self.root.join(class.as_str());
            let mut pending = vec![class_root.clone()];

            while let Some(dir) = pending.pop() {
                let mut entries = match tokio::fs::read_dir(&dir).await {
                    Ok(entries) => entries,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(io_err(&dir, e)),
                };

                while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(&dir, e))? {
                    let path = entry.path();
                    let file_type = entry.file_type().await.map_err(|e| io_err(&path, e))?;
                    if file_type.is_dir() {
                        pending.push(path);
                        continue;
                    }

                    let Ok(relative) = path.strip_prefix(&class_root) else {
                        continue;
                    };
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    if key.starts_with(prefix) {
                        objects.push(ObjectInfo {
                            key,
                            storage_class: class,
                        });
                    }
                }
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<(), MirrorError> {
        if let Some((_, path)) = self.locate(key).await {
            tokio::fs::remove_file(&path).await.map_err(|e| io_err(&path, e))?;
        }
        Ok(())
    }

    async fn set_storage_class(&self, key: &str, class: StorageClass) -> Result<(), MirrorError> {
        let Some((current, from)) = self.locate(key).await else {
            return Ok(());
        };
        if current == class {
            return Ok(());
        }

        let to = self.path_for(class, key);
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }
        tokio::fs::rename(&from, &to).await.map_err(|e| io_err(&from, e))
    }
}

/// Filesystem bucket for `storage.mirror_root`, when the mirror is enabled.
pub fn object_store_from_config(
    storage: &StorageConfig,
    bucket_name: Option<&str>,
) -> Result<Option<Arc<dyn ObjectStore>>, ConfigError> {
    let Some(root) = &storage.mirror_root else {
        return Ok(None);
    };
    let bucket = bucket_name.ok_or(ConfigError::MissingEnv("BUCKET_NAME"))?;
    Ok(Some(Arc::new(FsObjectStore::new(root.clone(), bucket))))
}

#[derive(Serialize)]
struct HistorySnapshot<'a> {
    timestamp: i64,
    prices: &'a [CurrentPriceDocument],
}

fn date_path(prefix: &str, date: NaiveDate, file: &str) -> String {
    format!("{}/{}/{}", prefix, date.format("%Y/%m/%d"), file)
}

/// Writes a cycle's records to the object store.
#[derive(Clone)]
pub struct PriceMirror {
    objects: Arc<dyn ObjectStore>,
    catalog: Catalog,
}

impl PriceMirror {
    pub fn new(objects: Arc<dyn ObjectStore>, catalog: Catalog) -> Self {
        Self { objects, catalog }
    }

    pub async fn write_cycle(
        &self,
        cycle_at: DateTime<Utc>,
        records: &[CurrentPriceRecord],
    ) -> Result<(), MirrorError> {
        let date = cycle_at.date_naive();
        let documents: Vec<CurrentPriceDocument> =
            records.iter().map(|r| r.to_document(&self.catalog)).collect();

        let prices_key = date_path(PRICES_PREFIX, date, "prices.json");
        self.objects
            .put(&prices_key, serde_json::to_vec_pretty(&documents)?)
            .await?;

        let history_key = date_path(HISTORY_PREFIX, date, "history.json");
        let snapshot = HistorySnapshot {
            timestamp: cycle_at.timestamp(),
            prices: &documents,
        };
        self.objects
            .put(&history_key, serde_json::to_vec_pretty(&snapshot)?)
            .await?;

        debug!(prices_key = %prices_key, history_key = %history_key, "Mirrored cycle");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MirrorRetentionStats {
    pub deleted: u64,
    pub transitioned: u64,
    pub failed: u64,
}

/// Age-based lifecycle for mirrored objects.
#[derive(Clone)]
pub struct MirrorRetention {
    objects: Arc<dyn ObjectStore>,
    retention_days: u32,
    nearline_after_days: u32,
}

/// Date encoded in `<prefix>/YYYY/MM/DD/<file>`.
pub fn key_date(key: &str) -> Option<NaiveDate> {
    let mut parts = key.split('/').skip(1);
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

impl MirrorRetention {
    pub fn new(objects: Arc<dyn ObjectStore>, retention_days: u32, nearline_after_days: u32) -> Self {
        Self {
            objects,
            retention_days,
            nearline_after_days,
        }
    }

    pub async fn apply(&self, today: NaiveDate) -> Result<MirrorRetentionStats, MirrorError> {
        let mut stats = MirrorRetentionStats::default();

        for prefix in [PRICES_PREFIX, HISTORY_PREFIX] {
            for object in self.objects.list(&format!("{}/", prefix)).await? {
                let Some(date) = key_date(&object.key) else {
                    continue;
                };
                let age_days = (today - date).num_days();

                let expired = age_days > i64::from(self.retention_days);
                let cold = age_days >= i64::from(self.nearline_after_days)
                    && object.storage_class == StorageClass::Standard;

                let result = if expired {
                    self.objects.delete(&object.key).await
                } else if cold {
                    self.objects
                        .set_storage_class(&object.key, StorageClass::Nearline)
                        .await
                } else {
                    continue;
                };

                match result {
                    Ok(()) if expired => stats.deleted += 1,
                    Ok(()) => stats.transitioned += 1,
                    Err(e) => {
                        stats.failed += 1;
                        warn!(key = %object.key, error = %e, "Mirror lifecycle action failed");
                    }
                }
            }
        }

        info!(
            deleted = stats.deleted,
            transitioned = stats.transitioned,
            failed = stats.failed,
            "Mirror retention applied"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_date() {
        assert_eq!(
            key_date("prices/2025/03/01/prices.json"),
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
        assert_eq!(key_date("prices/latest.json"), None);
    }

    #[tokio::test]
    async fn test_fs_store_put_list_transition_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "bucket");

        store.put("prices/2025/03/01/prices.json", b"[]".to_vec()).await.unwrap();
        let listed = store.list("prices/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].storage_class, StorageClass::Standard);

        store
            .set_storage_class("prices/2025/03/01/prices.json", StorageClass::Nearline)
            .await
            .unwrap();
        let listed = store.list("prices/").await.unwrap();
        assert_eq!(listed[0].storage_class, StorageClass::Nearline);

        store.delete("prices/2025/03/01/prices.json").await.unwrap();
        assert!(store.list("prices/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retention_deletes_and_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsObjectStore::new(dir.path(), "bucket"));
        let today = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();

        for key in [
            "prices/2025/03/01/prices.json",  // 30 days: delete
            "history/2025/03/20/history.json", // 11 days: nearline
            "prices/2025/03/30/prices.json",  // 1 day: keep
        ] {
            store.put(key, b"{}".to_vec()).await.unwrap();
        }

        let retention = MirrorRetention::new(store.clone(), 14, 7);
        let stats = retention.apply(today).await.unwrap();
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.transitioned, 1);

        let history = store.list("history/").await.unwrap();
        assert_eq!(history[0].storage_class, StorageClass::Nearline);
        let prices = store.list("prices/").await.unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].storage_class, StorageClass::Standard);
    }
}
