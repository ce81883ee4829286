//! Price Cycle
//!
//! One cycle fetches every configured vendor page under a semaphore, turns
//! rows into observations, aggregates them per (series, capacity), writes
//! current prices then history, mirrors the result and sweeps expired history.
//!
//! The single-shot entry point is [`PriceCycle::run`]; the server can also run
//! it on an interval with [`start_price_cycle_job`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, Instant};
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::{ConfigError, CycleError, FetchError, StoreError};
use crate::models::catalog::Catalog;
use crate::models::records::CurrentPriceRecord;
use crate::scrapers::browser::{BrowserEngine, RowHandle};
use crate::scrapers::fetcher::PageFetcher;
use crate::scrapers::{vendor_id, RowOutcome, RowProcessor};
use crate::services::aggregator::Aggregator;
use crate::services::history::HistoryService;
use crate::services::mirror::{MirrorRetention, ObjectStore, PriceMirror};
use crate::services::retention::RetentionSweeper;
use crate::services::store::DocumentStore;

/// Execution knobs of a cycle, resolved from configuration.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub urls: Vec<String>,
    pub request_timeout: Duration,
    /// Attempts per URL, including the first.
    pub retry_count: u32,
    pub retry_min_delay: Duration,
    pub retry_max_delay: Duration,
    pub max_concurrent_fetches: usize,
    pub retention_days: u32,
    pub nearline_after_days: u32,
    pub cycle_timeout: Option<Duration>,
}

impl CycleSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let s = &config.scraper;
        Self {
            urls: s.kaitori_rudea_urls.clone(),
            request_timeout: s.request_timeout(),
            retry_count: s.retry_count,
            retry_min_delay: Duration::from_millis(s.retry_min_delay_ms),
            retry_max_delay: Duration::from_millis(s.retry_max_delay_ms),
            max_concurrent_fetches: s.max_concurrent_fetches,
            retention_days: s.retention_days,
            nearline_after_days: config.storage.nearline_after_days,
            cycle_timeout: s.cycle_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Delays between attempts: `2^n * min/2` ms capped at the max, base 2.
    fn backoff(&self) -> impl Iterator<Item = Duration> + use<> {
        let factor = (self.retry_min_delay.as_millis() / 2) as u64;
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.retry_max_delay)
            .take(self.retry_count.saturating_sub(1) as usize)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub urls_total: u64,
    pub urls_ok: u64,
    pub urls_failed: u64,
    /// URLs never dispatched because of a shutdown signal or the cycle timeout.
    pub urls_cancelled: u64,
    /// Pages that loaded but yielded no rows.
    pub urls_empty: u64,
    pub rows_seen: u64,
    pub rows_accepted: u64,
    pub records_written: u64,
    pub history_written: u64,
    pub records_swept: u64,
    pub duration_ms: u64,
}

type UrlResult = Result<Vec<RowOutcome>, FetchError>;

pub struct PriceCycle {
    settings: CycleSettings,
    fetcher: PageFetcher,
    processor: Arc<RowProcessor>,
    store: Arc<dyn DocumentStore>,
    history: HistoryService,
    sweeper: RetentionSweeper,
    mirror: Option<(PriceMirror, MirrorRetention)>,
}

impl PriceCycle {
    pub fn new(
        settings: CycleSettings,
        fetcher: PageFetcher,
        processor: RowProcessor,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let history = HistoryService::new(store.clone(), settings.retention_days);
        let sweeper = RetentionSweeper::new(store.clone(), settings.retention_days);
        Self {
            settings,
            fetcher,
            processor: Arc::new(processor),
            store,
            history,
            sweeper,
            mirror: None,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        engine: Arc<dyn BrowserEngine>,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, ConfigError> {
        let s = &config.scraper;
        let catalog = config.catalog();
        let processor =
            RowProcessor::from_settings(&catalog, &s.model_selector, &s.price_selector, &s.color_tokens)?;
        let fetcher = PageFetcher::new(engine, s.row_selector.clone());

        Ok(Self::new(CycleSettings::from_config(config), fetcher, processor, store))
    }

    /// Mirror every cycle's records into `objects`.
    pub fn with_mirror(mut self, objects: Arc<dyn ObjectStore>, catalog: Catalog) -> Self {
        let retention = MirrorRetention::new(
            objects.clone(),
            self.settings.retention_days,
            self.settings.nearline_after_days,
        );
        self.mirror = Some((PriceMirror::new(objects, catalog), retention));
        self
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    /// Run one cycle. Raising `shutdown` stops dispatching new fetches; rows
    /// already fetched are still aggregated and written.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<CycleSummary, CycleError> {
        let started = Instant::now();
        let cycle_at = Utc::now();
        let deadline = self.settings.cycle_timeout.map(|t| started + t);

        info!(
            cycle_at = %cycle_at,
            urls = self.settings.urls.len(),
            max_concurrent_fetches = self.settings.max_concurrent_fetches,
            "Starting price cycle"
        );

        let mut summary = CycleSummary {
            urls_total: self.settings.urls.len() as u64,
            ..Default::default()
        };

        let (results, cancelled) = self.fetch_all(&mut shutdown, deadline).await;
        summary.urls_cancelled = cancelled;

        let mut aggregator = Aggregator::new(cycle_at);
        for (url, result) in self.settings.urls.iter().zip(results) {
            match result {
                Some(Ok(outcomes)) => {
                    summary.urls_ok += 1;
                    if outcomes.is_empty() {
                        summary.urls_empty += 1;
                        warn!(url = %url, "Vendor page yielded no rows, check the row selector or page rendering");
                    }
                    for outcome in outcomes {
                        aggregator.ingest(outcome);
                    }
                }
                Some(Err(e)) => {
                    summary.urls_failed += 1;
                    warn!(url = %url, error = %e, "Vendor page failed after retries");
                }
                None => {}
            }
        }

        let (records, counters) = aggregator.finish();
        summary.rows_seen = counters.rows_seen;
        summary.rows_accepted = counters.rows_accepted;
        if !counters.skipped.is_empty() {
            info!(
                parse_errors = counters.parse_errors(),
                validation_errors = counters.validation_errors(),
                "Rows skipped"
            );
        }

        let written = self.write_records(&records, &mut summary).await?;

        if let Some((mirror, retention)) = &self.mirror {
            self.mirror_cycle(mirror, retention, cycle_at, &written).await;
        }

        summary.records_swept = self.sweeper.sweep_best_effort(Utc::now()).await;
        summary.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            urls_total = summary.urls_total,
            urls_ok = summary.urls_ok,
            urls_failed = summary.urls_failed,
            urls_cancelled = summary.urls_cancelled,
            urls_empty = summary.urls_empty,
            rows_seen = summary.rows_seen,
            rows_accepted = summary.rows_accepted,
            records_written = summary.records_written,
            history_written = summary.history_written,
            records_swept = summary.records_swept,
            duration_ms = summary.duration_ms,
            "Price cycle complete"
        );
        Ok(summary)
    }

    /// Run one cycle that can only be cut short by its own timeout.
    pub async fn run_once(&self) -> Result<CycleSummary, CycleError> {
        let (_tx, rx) = watch::channel(false);
        self.run(rx).await
    }

    /// Fetch every URL under the semaphore. Results are indexed like the URL
    /// list; `None` marks a URL that was never dispatched or was aborted.
    async fn fetch_all(
        &self,
        shutdown: &mut watch::Receiver<bool>,
        deadline: Option<Instant>,
    ) -> (Vec<Option<UrlResult>>, u64) {
        let total = self.settings.urls.len();
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_fetches));
        let mut tasks: JoinSet<(usize, UrlResult)> = JoinSet::new();
        let mut results: Vec<Option<UrlResult>> = vec![None; total];
        let mut cancelled = 0u64;
        let mut timed_out = false;

        for (index, url) in self.settings.urls.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = wait_for_shutdown(shutdown) => {
                    info!(remaining = total - index, "Shutdown requested, no further fetches dispatched");
                    cancelled = (total - index) as u64;
                    break;
                }
                _ = deadline_reached(deadline) => {
                    warn!(remaining = total - index, "Cycle timeout reached while dispatching");
                    cancelled = (total - index) as u64;
                    timed_out = true;
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        cancelled = (total - index) as u64;
                        break;
                    }
                },
            };

            let fetcher = self.fetcher.clone();
            let processor = self.processor.clone();
            let url = url.clone();
            let timeout = self.settings.request_timeout;
            let backoff: Vec<Duration> = self.settings.backoff().collect();

            tasks.spawn(async move {
                let _permit = permit;
                let source = vendor_id(&url);
                let result: UrlResult = fetch_with_retry(&fetcher, &url, timeout, backoff)
                    .await
                    .map(|rows| {
                        debug!(url = %url, rows = rows.len(), "Processing rows");
                        rows.iter().map(|row| processor.process(row, &source)).collect()
                    });
                (index, result)
            });
        }

        if timed_out {
            tasks.abort_all();
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = deadline_reached(deadline), if !timed_out => {
                    warn!(in_flight = tasks.len(), "Cycle timeout reached, aborting outstanding fetches");
                    timed_out = true;
                    tasks.abort_all();
                    continue;
                }
                next = tasks.join_next() => next,
            };

            match next {
                None => break,
                Some(Ok((index, result))) => results[index] = Some(result),
                Some(Err(e)) if e.is_cancelled() => {}
                Some(Err(e)) => error!(error = %e, "Fetch task panicked"),
            }
        }

        // Aborted fetches count as failed URLs
        let dispatched = total - cancelled as usize;
        for slot in results.iter_mut().take(dispatched) {
            if slot.is_none() {
                *slot = Some(Err(FetchError::Engine("fetch aborted".to_string())));
            }
        }

        (results, cancelled)
    }

    /// Sequential writes in key order: current price, then history.
    async fn write_records(
        &self,
        records: &[CurrentPriceRecord],
        summary: &mut CycleSummary,
    ) -> Result<Vec<CurrentPriceRecord>, CycleError> {
        let mut written = Vec::with_capacity(records.len());

        for (i, record) in records.iter().enumerate() {
            if let Err(e) = self.upsert_with_conflict_retry(record).await {
                if i == 0 && matches!(e, StoreError::Unavailable(_)) {
                    error!(error = %e, "Document store unavailable on first write, aborting cycle");
                    return Err(CycleError::StorageUnavailable(e));
                }
                warn!(series = ?record.series, capacity = %record.capacity, error = %e, "Current price write failed");
                continue;
            }
            summary.records_written += 1;

            match self.history.record(record).await {
                Ok(id) => {
                    summary.history_written += 1;
                    debug!(id = %id, capacity = %record.capacity, "History appended");
                }
                Err(e) => {
                    warn!(series = ?record.series, capacity = %record.capacity, error = %e, "History write failed");
                }
            }
            written.push(record.clone());
        }

        Ok(written)
    }

    async fn upsert_with_conflict_retry(&self, record: &CurrentPriceRecord) -> Result<(), StoreError> {
        match self.store.upsert_current(record).await {
            Err(StoreError::WriteConflict(detail)) => {
                debug!(detail = %detail, "Write conflict, retrying once");
                self.store.upsert_current(record).await
            }
            other => other,
        }
    }

    async fn mirror_cycle(
        &self,
        mirror: &PriceMirror,
        retention: &MirrorRetention,
        cycle_at: DateTime<Utc>,
        records: &[CurrentPriceRecord],
    ) {
        if let Err(e) = mirror.write_cycle(cycle_at, records).await {
            warn!(error = %e, "Object-store mirror write failed");
        }
        if let Err(e) = retention.apply(cycle_at.date_naive()).await {
            warn!(error = %e, "Object-store retention failed");
        }
    }
}

async fn fetch_with_retry(
    fetcher: &PageFetcher,
    url: &str,
    timeout: Duration,
    backoff: Vec<Duration>,
) -> Result<Vec<RowHandle>, FetchError> {
    let attempts = AtomicU32::new(0);

    Retry::spawn(backoff, || {
        let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
        async move {
            fetcher.fetch(url, timeout).await.inspect_err(|e| {
                warn!(url = %url, attempt = attempt, error = %e, "Fetch attempt failed");
            })
        }
    })
    .await
}

/// Shutdown flag raised on Ctrl-C.
pub fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, finishing in-flight work");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!(error = %e, "Could not listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        }
    });
    shutdown_rx
}

/// Resolves once the shutdown flag is raised. Never resolves if the sender is gone.
pub async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// Start the scheduled price cycle job
///
/// Spawns a background task that runs the cycle every `every` until
/// `shutdown` is raised.
pub fn start_price_cycle_job(
    cycle: Arc<PriceCycle>,
    every: Duration,
    shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        error!("Price cycle interval must be positive, job not started");
        return None;
    }

    Some(tokio::spawn(async move {
        info!(interval_secs = every.as_secs(), "Initializing price cycle job");

        let mut stop = shutdown.clone();
        let mut ticker = interval(every);

        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut stop) => {
                    info!("Shutdown signal received, stopping price cycle job gracefully");
                    break;
                }
                _ = ticker.tick() => {
                    match cycle.run(shutdown.clone()).await {
                        Ok(summary) => debug!(?summary, "Scheduled price cycle finished"),
                        Err(e) => error!(error = %e, "Scheduled price cycle failed"),
                    }
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(retry_count: u32, min_ms: u64, max_ms: u64) -> CycleSettings {
        CycleSettings {
            urls: vec![],
            request_timeout: Duration::from_secs(60),
            retry_count,
            retry_min_delay: Duration::from_millis(min_ms),
            retry_max_delay: Duration::from_millis(max_ms),
            max_concurrent_fetches: 3,
            retention_days: 14,
            nearline_after_days: 7,
            cycle_timeout: None,
        }
    }

    #[test]
    fn test_backoff_schedule() {
        let delays: Vec<u64> = settings(5, 2_000, 30_000)
            .backoff()
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![2_000, 4_000, 8_000, 16_000]);
    }

    #[test]
    fn test_backoff_capped() {
        let delays: Vec<u64> = settings(8, 2_000, 30_000)
            .backoff()
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(delays.len(), 7);
        assert!(delays.iter().all(|d| *d <= 30_000));
        assert_eq!(*delays.last().unwrap(), 30_000);
    }

    #[test]
    fn test_single_attempt_has_no_delays() {
        assert_eq!(settings(1, 2_000, 30_000).backoff().count(), 0);
    }
}
