use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::browser::{BrowserEngine, BrowserPage, RowHandle};
use crate::error::FetchError;

/// Loads one vendor page and returns its price rows.
#[derive(Clone)]
pub struct PageFetcher {
    engine: Arc<dyn BrowserEngine>,
    row_selector: String,
}

impl PageFetcher {
    pub fn new(engine: Arc<dyn BrowserEngine>, row_selector: impl Into<String>) -> Self {
        Self {
            engine,
            row_selector: row_selector.into(),
        }
    }

    /// Fetch the rows of `url`. The page is closed on every exit path,
    /// and `timeout` bounds navigation plus row selection.
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<RowHandle>, FetchError> {
        let mut page = self.engine.new_page().await?;

        let result = match tokio::time::timeout(timeout, self.load_rows(page.as_mut(), url, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                secs: timeout.as_secs(),
            }),
        };

        page.close().await;

        if let Ok(rows) = &result {
            debug!(url = %url, rows = rows.len(), "Fetched vendor page");
        }
        result
    }

    async fn load_rows(
        &self,
        page: &mut dyn BrowserPage,
        url: &str,
        timeout: Duration,
    ) -> Result<Vec<RowHandle>, FetchError> {
        page.goto(url, timeout).await?;
        page.query_selector_all(&self.row_selector).await
    }
}
