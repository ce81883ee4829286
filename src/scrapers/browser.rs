//! Browser engine abstraction.
//!
//! The cycle only needs "open a page, navigate, select rows, close". Engines
//! that render JavaScript plug in behind [`BrowserEngine`]; the shipped
//! [`HttpBrowser`] fetches the served HTML with reqwest and selects rows with
//! scraper, which is enough for vendors that render prices server-side.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;

use crate::error::FetchError;

/// Detached price row. Holds the row's outer HTML so it can cross tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowHandle {
    html: String,
}

impl RowHandle {
    pub fn from_html(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// Trimmed inner text of the first element matching `selector`, if any.
    pub fn inner_text(&self, selector: &Selector) -> Option<String> {
        let fragment = Html::parse_fragment(&self.html);
        let text = fragment
            .select(selector)
            .next()
            .map(|el: ElementRef| el.text().collect::<Vec<_>>().join(" "))?;

        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() {
            None
        } else {
            Some(normalized)
        }
    }
}

#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Open a fresh page. Pages are not shared between fetches.
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, FetchError>;
}

#[async_trait]
pub trait BrowserPage: Send {
    /// Navigate and wait until the page is settled.
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), FetchError>;

    async fn query_selector_all(&mut self, selector: &str) -> Result<Vec<RowHandle>, FetchError>;

    async fn close(self: Box<Self>);
}

/// Static-HTML engine: one GET per navigation, rows selected from the body.
#[derive(Clone)]
pub struct HttpBrowser {
    client: Client,
}

impl HttpBrowser {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| FetchError::Engine(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl BrowserEngine for HttpBrowser {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, FetchError> {
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            body: None,
        }))
    }
}

struct HttpPage {
    client: Client,
    body: Option<String>,
}

#[async_trait]
impl BrowserPage for HttpPage {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), FetchError> {
        let navigation = |reason: String| FetchError::Navigation {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: url.to_string(),
                        secs: timeout.as_secs(),
                    }
                } else {
                    navigation(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(navigation(format!("HTTP {}", status)));
        }

        let body = response.text().await.map_err(|e| navigation(e.to_string()))?;
        debug!(url = %url, bytes = body.len(), "Page loaded");
        self.body = Some(body);
        Ok(())
    }

    async fn query_selector_all(&mut self, selector: &str) -> Result<Vec<RowHandle>, FetchError> {
        let body = self
            .body
            .as_deref()
            .ok_or_else(|| FetchError::Engine("query before navigation".to_string()))?;
        select_rows(body, selector)
    }

    async fn close(self: Box<Self>) {}
}

/// Select every element matching `selector` in a document as detached rows.
pub fn select_rows(document: &str, selector: &str) -> Result<Vec<RowHandle>, FetchError> {
    let selector = Selector::parse(selector).map_err(|_| FetchError::Selector(selector.to_string()))?;
    let document = Html::parse_document(document);

    Ok(document
        .select(&selector)
        .map(|el| RowHandle::from_html(el.html()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="tr"><div class="ttl"><h2>  iPhone 16 128GB 黒 </h2></div></div>
          <div class="tr"><div class="ttl"><h2>iPhone 16 Pro 256GB</h2></div></div>
          <div class="other">ignored</div>
        </body></html>
    "#;

    #[test]
    fn test_select_rows() {
        let rows = select_rows(PAGE, ".tr").unwrap();
        assert_eq!(rows.len(), 2);

        let title = Selector::parse(".ttl h2").unwrap();
        assert_eq!(rows[0].inner_text(&title).as_deref(), Some("iPhone 16 128GB 黒"));
    }

    #[test]
    fn test_invalid_selector() {
        assert!(matches!(select_rows(PAGE, "[[["), Err(FetchError::Selector(_))));
    }

    #[test]
    fn test_missing_element_is_none() {
        let row = RowHandle::from_html(r#"<div class="tr"></div>"#);
        let title = Selector::parse(".ttl h2").unwrap();
        assert_eq!(row.inner_text(&title), None);
    }
}
