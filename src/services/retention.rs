//! Retention Sweeper
//!
//! Deletes history records older than the retention window. Best-effort:
//! per-record failures are logged and counted, never propagated into a cycle.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::store::DocumentStore;
use crate::error::SweepError;
use crate::models::records::SECS_PER_DAY;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub candidates: u64,
    pub deleted: u64,
    pub failed: u64,
}

#[derive(Clone)]
pub struct RetentionSweeper {
    store: Arc<dyn DocumentStore>,
    window_secs: i64,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn DocumentStore>, retention_days: u32) -> Self {
        Self {
            store,
            window_secs: i64::from(retention_days) * SECS_PER_DAY,
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp() - self.window_secs
    }

    /// Delete every record with `timestamp < now - window`.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepStats, SweepError> {
        let cutoff = self.cutoff(now);
        let expired = self
            .store
            .history_older_than(cutoff)
            .await
            .map_err(SweepError::Listing)?;

        let mut stats = SweepStats {
            candidates: expired.len() as u64,
            ..Default::default()
        };

        for id in &expired {
            match self.store.delete_history(id).await {
                Ok(()) => stats.deleted += 1,
                Err(e) => {
                    stats.failed += 1;
                    warn!(id = %id, error = %e, "Failed to delete expired history record");
                }
            }
        }

        info!(
            cutoff = cutoff,
            candidates = stats.candidates,
            deleted = stats.deleted,
            failed = stats.failed,
            "Retention sweep complete"
        );
        Ok(stats)
    }

    /// `sweep` with failures folded into a zero count.
    pub async fn sweep_best_effort(&self, now: DateTime<Utc>) -> u64 {
        match self.sweep(now).await {
            Ok(stats) => stats.deleted,
            Err(e) => {
                warn!(error = %e, "Retention sweep failed");
                0
            }
        }
    }
}
