use lazy_static::lazy_static;
use regex::Regex;
use scraper::Selector;

use super::browser::RowHandle;
use crate::error::{ConfigError, SkipReason};
use crate::models::catalog::Capacity;
use crate::models::price::Price;

/// Color recorded when no configured token matches.
pub const UNKNOWN_COLOR: &str = "unknown";

lazy_static! {
    static ref CAPACITY_REGEX: Regex = Regex::new(r"(?i)(\d+)\s*([GT])B").unwrap();

    static ref PRICE_RUN_REGEX: Regex = Regex::new(r"\d[\d,]*").unwrap();

    // "85,000", "165,000", "90000"
    static ref PRICE_FORMAT_REGEX: Regex = Regex::new(r"^(?:\d{1,3}(?:,\d{3})+|\d+)$").unwrap();
}

/// Normalized fields of one price row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    pub model_text: String,
    pub capacity: Capacity,
    pub color: String,
    pub price: Price,
}

#[derive(Debug, Clone)]
pub struct RowParser {
    model_selector: Selector,
    price_selector: Selector,
    color_regex: Regex,
}

impl RowParser {
    pub fn new(
        model_selector: &str,
        price_selector: &str,
        color_tokens: &[String],
    ) -> Result<Self, ConfigError> {
        let model_selector = Selector::parse(model_selector)
            .map_err(|e| ConfigError::invalid("scraper.model_selector", format!("{:?}", e)))?;
        let price_selector = Selector::parse(price_selector)
            .map_err(|e| ConfigError::invalid("scraper.price_selector", format!("{:?}", e)))?;

        Ok(Self {
            model_selector,
            price_selector,
            color_regex: build_color_regex(color_tokens)?,
        })
    }

    /// Extract and normalize one row. Never panics; every failure is a skip reason.
    pub fn parse(&self, row: &RowHandle) -> Result<ParsedRow, SkipReason> {
        let model_text = row
            .inner_text(&self.model_selector)
            .ok_or(SkipReason::MissingModel)?;

        let capacity = parse_capacity(&model_text)?;

        let color = self
            .color_regex
            .find(&model_text)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| UNKNOWN_COLOR.to_string());

        let price_text = row
            .inner_text(&self.price_selector)
            .ok_or(SkipReason::MissingPrice)?;
        let price = parse_price(&price_text)?;

        Ok(ParsedRow {
            model_text,
            capacity,
            color,
            price,
        })
    }
}

/// First `<n> GB|TB` token in the text, with `1GB` read as `1TB`.
pub fn parse_capacity(text: &str) -> Result<Capacity, SkipReason> {
    let caps = CAPACITY_REGEX
        .captures(text)
        .ok_or(SkipReason::MissingCapacity)?;

    let amount: u32 = caps[1].parse().map_err(|_| SkipReason::UnknownCapacity)?;
    let unit = caps[2].chars().next().ok_or(SkipReason::MissingCapacity)?;

    Capacity::from_parts(amount, unit).ok_or(SkipReason::UnknownCapacity)
}

/// First run of digits and separators in the text, which must be a plain or
/// correctly grouped number.
pub fn parse_price(text: &str) -> Result<Price, SkipReason> {
    let run = PRICE_RUN_REGEX
        .find(text)
        .map(|m| m.as_str().trim_end_matches(','))
        .ok_or(SkipReason::UnparsablePrice)?;
    if !PRICE_FORMAT_REGEX.is_match(run) {
        return Err(SkipReason::UnparsablePrice);
    }
    let digits = run.replace(',', "");

    let value: i64 = digits.parse().map_err(|_| SkipReason::UnparsablePrice)?;
    Price::new(value).map_err(|_| SkipReason::PriceOutOfRange)
}

/// Case-insensitive alternation of the tokens, longest first so that
/// `Black Titanium` wins over `Black`.
fn build_color_regex(tokens: &[String]) -> Result<Regex, ConfigError> {
    let mut tokens: Vec<&str> = tokens
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return Err(ConfigError::invalid(
            "scraper.color_tokens",
            "at least one color token is required",
        ));
    }
    tokens.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
    tokens.dedup();

    let alternation = tokens
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");

    Regex::new(&format!("(?i)(?:{})", alternation))
        .map_err(|e| ConfigError::invalid("scraper.color_tokens", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_color_tokens;

    fn row(model: &str, price: &str) -> RowHandle {
        RowHandle::from_html(format!(
            r#"<div class="tr"><div class="ttl"><h2>{}</h2></div><div class="td td2"><div class="td2wrap">{}</div></div></div>"#,
            model, price
        ))
    }

    fn parser() -> RowParser {
        RowParser::new(".ttl h2", ".td.td2 .td2wrap", &default_color_tokens()).unwrap()
    }

    #[test]
    fn test_parse_full_row() {
        let parsed = parser().parse(&row("iPhone 16 Pro 256GB Natural Titanium", "165,000円")).unwrap();
        assert_eq!(parsed.capacity, Capacity::Gb256);
        assert_eq!(parsed.color, "Natural Titanium");
        assert_eq!(parsed.price.get(), 165_000);
    }

    #[test]
    fn test_japanese_color_token() {
        let parsed = parser().parse(&row("iPhone 16 128GB 黒", "¥98,000")).unwrap();
        assert_eq!(parsed.color, "黒");
        assert_eq!(parsed.price.get(), 98_000);
    }

    #[test]
    fn test_unknown_color() {
        let parsed = parser().parse(&row("iPhone 16 128GB", "98000")).unwrap();
        assert_eq!(parsed.color, UNKNOWN_COLOR);
    }

    #[test]
    fn test_one_gb_typo_becomes_one_tb() {
        assert_eq!(parse_capacity("iPhone 16 Pro Max 1GB"), Ok(Capacity::Tb1));
        assert_eq!(parse_capacity("iPhone 16 Pro Max 1 tb"), Ok(Capacity::Tb1));
    }

    #[test]
    fn test_capacity_failures() {
        assert_eq!(parse_capacity("iPhone 16"), Err(SkipReason::MissingCapacity));
        assert_eq!(parse_capacity("iPhone 16 64GB"), Err(SkipReason::UnknownCapacity));
    }

    #[test]
    fn test_price_failures() {
        assert_eq!(parse_price("お問い合わせ"), Err(SkipReason::UnparsablePrice));
        assert_eq!(parse_price("0円"), Err(SkipReason::PriceOutOfRange));
        assert_eq!(parse_price("2,000,000円"), Err(SkipReason::PriceOutOfRange));
        assert_eq!(parse_price("1,999,999円").map(|p| p.get()), Ok(1_999_999));
    }

    #[test]
    fn test_misgrouped_price_is_unparsable() {
        assert_eq!(parse_price("1,2345円"), Err(SkipReason::UnparsablePrice));
        assert_eq!(parse_price("12,34円"), Err(SkipReason::UnparsablePrice));
        assert_eq!(parse_price("¥165,000〜").map(|p| p.get()), Ok(165_000));
        assert_eq!(parse_price("85,000, 税込").map(|p| p.get()), Ok(85_000));
    }

    #[test]
    fn test_missing_fields() {
        let p = parser();
        let no_model = RowHandle::from_html(r#"<div class="tr"><div class="td td2"><div class="td2wrap">1円</div></div></div>"#);
        assert_eq!(p.parse(&no_model), Err(SkipReason::MissingModel));

        let no_price = RowHandle::from_html(r#"<div class="tr"><div class="ttl"><h2>iPhone 16 128GB</h2></div></div>"#);
        assert_eq!(p.parse(&no_price), Err(SkipReason::MissingPrice));
    }
}
