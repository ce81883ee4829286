#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sea_orm::{Database, DatabaseConnection, DbErr};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::env;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kaitori_tracker::error::{FetchError, StoreError};
use kaitori_tracker::jobs::price_cycle::{CycleSettings, PriceCycle};
use kaitori_tracker::models::catalog::{Capacity, Catalog, Series};
use kaitori_tracker::models::official::OfficialPriceDoc;
use kaitori_tracker::models::price::Price;
use kaitori_tracker::models::records::{
    CurrentPriceRecord, HistoryId, HistoryRecord, StoredHistory,
};
use kaitori_tracker::scrapers::browser::{BrowserEngine, BrowserPage, RowHandle};
use kaitori_tracker::scrapers::fetcher::PageFetcher;
use kaitori_tracker::scrapers::RowProcessor;
use kaitori_tracker::services::memory_store::MemoryStore;
use kaitori_tracker::services::store::DocumentStore;

pub const ROW_SELECTOR: &str = ".tr";
pub const MODEL_SELECTOR: &str = ".ttl h2";
pub const PRICE_SELECTOR: &str = ".td.td2 .td2wrap";

/// Connect to the Postgres test database, if `TEST_DATABASE_URL` is set.
pub async fn setup_test_db() -> Option<Result<DatabaseConnection, DbErr>> {
    let database_url = env::var("TEST_DATABASE_URL").ok()?;
    Some(Database::connect(&database_url).await)
}

// ── Fixture pages ────────────────────────────────────────────────────────────

/// One vendor row in the `.tr` layout.
pub fn row(model: &str, price: &str) -> String {
    format!(
        r#"<div class="tr"><div class="ttl"><h2>{}</h2></div><div class="td td2"><div class="td2wrap">{}</div></div></div>"#,
        model, price
    )
}

// ── Fake browser ─────────────────────────────────────────────────────────────

type Scripted = Result<Vec<String>, FetchError>;

#[derive(Default)]
struct Script {
    /// Per-URL responses, consumed in order; the last one repeats.
    responses: HashMap<String, VecDeque<Scripted>>,
    delays: HashMap<String, Duration>,
}

/// Browser engine answering from a script instead of the network.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    script: Arc<Mutex<Script>>,
    navigations: Arc<Mutex<Vec<String>>>,
    pages_opened: Arc<AtomicUsize>,
    pages_closed: Arc<AtomicUsize>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, rows: Vec<String>) -> Self {
        self.push(url, Ok(rows));
        self
    }

    pub fn failure(self, url: &str) -> Self {
        self.push(
            url,
            Err(FetchError::Navigation {
                url: url.to_string(),
                reason: "connection reset".to_string(),
            }),
        );
        self
    }

    pub fn delay(self, url: &str, delay: Duration) -> Self {
        self.script.lock().delays.insert(url.to_string(), delay);
        self
    }

    fn push(&self, url: &str, response: Scripted) {
        self.script
            .lock()
            .responses
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    fn next_response(&self, url: &str) -> (Scripted, Option<Duration>) {
        let mut script = self.script.lock();
        let delay = script.delays.get(url).copied();
        let response = match script.responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        let response = response.unwrap_or_else(|| {
            Err(FetchError::Navigation {
                url: url.to_string(),
                reason: "no scripted response".to_string(),
            })
        });
        (response, delay)
    }

    pub fn navigations(&self, url: &str) -> usize {
        self.navigations.lock().iter().filter(|u| *u == url).count()
    }

    pub fn pages_opened(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst)
    }

    pub fn pages_closed(&self) -> usize {
        self.pages_closed.load(Ordering::SeqCst)
    }
}

struct FakePage {
    browser: FakeBrowser,
    rows: Vec<RowHandle>,
}

#[async_trait]
impl BrowserEngine for FakeBrowser {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, FetchError> {
        self.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            browser: self.clone(),
            rows: Vec::new(),
        }))
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> Result<(), FetchError> {
        self.browser.navigations.lock().push(url.to_string());
        let (response, delay) = self.browser.next_response(url);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.rows = response?.into_iter().map(RowHandle::from_html).collect();
        Ok(())
    }

    async fn query_selector_all(&mut self, _selector: &str) -> Result<Vec<RowHandle>, FetchError> {
        Ok(std::mem::take(&mut self.rows))
    }

    async fn close(self: Box<Self>) {
        self.browser.pages_closed.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Flaky store ──────────────────────────────────────────────────────────────

/// In-memory store with injectable failures.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    upsert_script: Mutex<VecDeque<Option<StoreError>>>,
    pub fail_history: AtomicBool,
    pub fail_reads: AtomicBool,
    pub fail_ping: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcome of the next upserts, one entry per call; `None` lets the call through.
    pub fn script_upserts(&self, outcomes: impl IntoIterator<Item = Option<StoreError>>) {
        self.upsert_script.lock().extend(outcomes);
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(StoreError::Backend("injected read failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn ping(&self) -> Result<(), StoreError> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected ping failure".to_string()));
        }
        self.inner.ping().await
    }

    async fn upsert_current(&self, record: &CurrentPriceRecord) -> Result<(), StoreError> {
        let scripted = self.upsert_script.lock().pop_front().flatten();
        if let Some(e) = scripted {
            return Err(e);
        }
        self.inner.upsert_current(record).await
    }

    async fn current_for_series(&self, series: Series) -> Result<Vec<CurrentPriceRecord>, StoreError> {
        self.check_reads()?;
        self.inner.current_for_series(series).await
    }

    async fn all_current(&self) -> Result<Vec<CurrentPriceRecord>, StoreError> {
        self.check_reads()?;
        self.inner.all_current().await
    }

    async fn wipe_current(&self) -> Result<u64, StoreError> {
        self.inner.wipe_current().await
    }

    async fn official_prices(&self) -> Result<Vec<OfficialPriceDoc>, StoreError> {
        self.check_reads()?;
        self.inner.official_prices().await
    }

    async fn replace_official(&self, docs: &[OfficialPriceDoc]) -> Result<(), StoreError> {
        self.inner.replace_official(docs).await
    }

    async fn append_history(&self, record: &HistoryRecord) -> Result<HistoryId, StoreError> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected history failure".to_string()));
        }
        self.inner.append_history(record).await
    }

    async fn history_for(
        &self,
        series: Series,
        capacity: Capacity,
        since: i64,
    ) -> Result<Vec<StoredHistory>, StoreError> {
        self.check_reads()?;
        self.inner.history_for(series, capacity, since).await
    }

    async fn history_older_than(&self, cutoff: i64) -> Result<Vec<HistoryId>, StoreError> {
        self.inner.history_older_than(cutoff).await
    }

    async fn delete_history(&self, id: &HistoryId) -> Result<(), StoreError> {
        self.inner.delete_history(id).await
    }
}

// ── Builders ─────────────────────────────────────────────────────────────────

pub fn catalog() -> Catalog {
    Catalog::new("iPhone 16")
}

pub fn color_tokens() -> Vec<String> {
    ["Black", "White", "Natural", "Pink"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Settings with instant retries so tests never sleep on backoff.
pub fn settings(urls: &[&str]) -> CycleSettings {
    CycleSettings {
        urls: urls.iter().map(|u| u.to_string()).collect(),
        request_timeout: Duration::from_secs(5),
        retry_count: 5,
        retry_min_delay: Duration::ZERO,
        retry_max_delay: Duration::ZERO,
        max_concurrent_fetches: 3,
        retention_days: 14,
        nearline_after_days: 7,
        cycle_timeout: None,
    }
}

pub fn cycle(settings: CycleSettings, browser: &FakeBrowser, store: Arc<dyn DocumentStore>) -> PriceCycle {
    let processor =
        RowProcessor::from_settings(&catalog(), MODEL_SELECTOR, PRICE_SELECTOR, &color_tokens())
            .unwrap();
    let fetcher = PageFetcher::new(Arc::new(browser.clone()), ROW_SELECTOR);
    PriceCycle::new(settings, fetcher, processor, store)
}

pub fn record(
    series: Series,
    capacity: Capacity,
    colors: &[(&str, i64)],
    updated_at: DateTime<Utc>,
) -> CurrentPriceRecord {
    let colors: BTreeMap<String, Price> = colors
        .iter()
        .map(|(c, p)| (c.to_string(), Price::new(*p).unwrap()))
        .collect();
    let min = *colors.values().min().unwrap();
    let max = *colors.values().max().unwrap();
    CurrentPriceRecord {
        series,
        capacity,
        colors,
        kaitori_price_min: min,
        kaitori_price_max: max,
        source: "kaitori-rudea".to_string(),
        updated_at,
    }
}
