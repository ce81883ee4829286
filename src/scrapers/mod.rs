pub mod browser;
pub mod classifier;
pub mod fetcher;
pub mod parser;

use crate::error::{ConfigError, SkipReason};
use crate::models::catalog::{Capacity, Catalog, Series};
use crate::models::price::Price;
use browser::RowHandle;
use classifier::ModelClassifier;
use parser::RowParser;

/// Result of pushing one row through parsing and classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// A single `(series, capacity, color, price)` observation; `source` is the vendor id.
    Accepted {
        series: Series,
        capacity: Capacity,
        color: String,
        price: Price,
        source: String,
    },
    Skipped(SkipReason),
}

/// Parser and classifier bundled for the per-row hot path.
#[derive(Debug, Clone)]
pub struct RowProcessor {
    parser: RowParser,
    classifier: ModelClassifier,
}

impl RowProcessor {
    pub fn new(parser: RowParser, classifier: ModelClassifier) -> Self {
        Self { parser, classifier }
    }

    pub fn from_settings(
        catalog: &Catalog,
        model_selector: &str,
        price_selector: &str,
        color_tokens: &[String],
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            parser: RowParser::new(model_selector, price_selector, color_tokens)?,
            classifier: ModelClassifier::new(catalog)?,
        })
    }

    /// Total: every row yields an outcome, never an error.
    pub fn process(&self, row: &RowHandle, source: &str) -> RowOutcome {
        let parsed = match self.parser.parse(row) {
            Ok(parsed) => parsed,
            Err(reason) => return RowOutcome::Skipped(reason),
        };

        match self.classifier.classify(&parsed.model_text, parsed.capacity) {
            Ok(series) => RowOutcome::Accepted {
                series,
                capacity: parsed.capacity,
                color: parsed.color,
                price: parsed.price,
                source: source.to_string(),
            },
            Err(rejected) => RowOutcome::Skipped(rejected.into()),
        }
    }
}

/// Vendor identifier from a URL host: `https://www.kaitori-rudea.com/x` -> `kaitori-rudea`.
pub fn vendor_id(raw_url: &str) -> String {
    let Some(host) = url::Url::parse(raw_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
    else {
        return raw_url.to_string();
    };

    let host = host.strip_prefix("www.").unwrap_or(&host);
    match host.rsplit_once('.') {
        Some((name, _tld)) if !name.is_empty() => name.to_string(),
        _ => host.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_id() {
        assert_eq!(vendor_id("https://kaitori-rudea.com/category/detail/183"), "kaitori-rudea");
        assert_eq!(vendor_id("https://www.mobile-mix.jp/"), "mobile-mix");
        assert_eq!(vendor_id("http://localhost:8080/page"), "localhost");
        assert_eq!(vendor_id("not a url"), "not a url");
    }

    #[test]
    fn test_process_accepts_and_rejects() {
        let catalog = Catalog::new("Series");
        let processor = RowProcessor::from_settings(
            &catalog,
            ".ttl h2",
            ".td.td2 .td2wrap",
            &["Black".to_string()],
        )
        .unwrap();

        let ok = RowHandle::from_html(
            r#"<div class="tr"><div class="ttl"><h2>Series-Pro 256GB Black</h2></div><div class="td td2"><div class="td2wrap">85,000円</div></div></div>"#,
        );
        match processor.process(&ok, "vendor") {
            RowOutcome::Accepted { series, capacity, price, color, .. } => {
                assert_eq!(series, Series::Pro);
                assert_eq!(capacity, Capacity::Gb256);
                assert_eq!(price.get(), 85_000);
                assert_eq!(color, "Black");
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let bad = RowHandle::from_html(
            r#"<div class="tr"><div class="ttl"><h2>Series e 1TB</h2></div><div class="td td2"><div class="td2wrap">90,000円</div></div></div>"#,
        );
        assert_eq!(
            processor.process(&bad, "vendor"),
            RowOutcome::Skipped(SkipReason::InvalidCombination)
        );
    }
}
