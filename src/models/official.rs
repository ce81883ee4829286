//! Official (manufacturer list) price documents.
//!
//! These are maintained out-of-band and served verbatim, so the price map is
//! kept as raw JSON and only interpreted when a comparison is computed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::catalog::{Capacity, Catalog, Series};

/// Official list prices at or above this are treated as unreadable.
pub const MAX_OFFICIAL_PRICE_JPY: i64 = 10_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficialPriceDoc {
    /// Series name, also the document id.
    pub id: String,
    /// `capacity -> int | {colors: {color: int}}`
    pub price: Value,
}

impl OfficialPriceDoc {
    /// Official price for one capacity, or 0 when absent or unreadable.
    ///
    /// A color map resolves to its lowest readable color price. Values outside
    /// `(0, MAX_OFFICIAL_PRICE_JPY)` are unreadable.
    pub fn price_for(&self, capacity: Capacity) -> i64 {
        let Some(entry) = self.price.get(capacity.as_str()) else {
            return 0;
        };

        match entry.get("colors") {
            Some(Value::Object(colors)) => colors
                .values()
                .filter_map(official_int)
                .min()
                .unwrap_or(0),
            Some(_) => 0,
            None => official_int(entry).unwrap_or(0),
        }
    }
}

fn official_int(value: &Value) -> Option<i64> {
    coerce_int(value).filter(|v| *v > 0 && *v < MAX_OFFICIAL_PRICE_JPY)
}

/// Find the document for a series by its canonical name, then by its alternate spelling.
pub fn find_for_series<'a>(
    docs: &'a [OfficialPriceDoc],
    catalog: &Catalog,
    series: Series,
) -> Option<&'a OfficialPriceDoc> {
    let name = catalog.name(series);
    docs.iter().find(|d| d.id == name).or_else(|| {
        catalog
            .alternate_name(series)
            .and_then(|alt| docs.iter().find(|d| d.id == alt))
    })
}

/// Lenient integer read: integers, floats (truncated) and numeric strings.
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}
