//! Price history request/response models
//!
//! Models for the GET /get_price_history endpoint that returns the recent
//! time series for one (series, capacity) pair.

use serde::{Deserialize, Serialize};

use super::catalog::{Capacity, Catalog, Series};
use super::records::HistoryRecord;

pub const DEFAULT_HISTORY_DAYS: u32 = 14;
pub const MAX_HISTORY_DAYS: u32 = 365;

/// Query parameters for the price history endpoint.
///
/// Everything is kept as raw strings so validation can name the offending
/// parameter instead of failing extraction wholesale.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub series: Option<String>,
    pub capacity: Option<String>,
    pub days: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidHistoryQuery {
    pub series: Series,
    pub capacity: Capacity,
    pub days: u32,
}

impl HistoryQuery {
    /// Validate against the catalog. Absent parameters take their defaults.
    pub fn validate(&self, catalog: &Catalog) -> Result<ValidHistoryQuery, String> {
        let series = match self.series.as_deref() {
            None => Series::Standard,
            Some(name) => catalog.parse_series(name).ok_or_else(|| {
                format!(
                    "Invalid series: '{}'. Valid series are: {}",
                    name,
                    catalog.names().join(", ")
                )
            })?,
        };

        let capacity = match self.capacity.as_deref() {
            None => Capacity::Gb128,
            Some(raw) => raw
                .parse::<Capacity>()
                .ok()
                .filter(|c| series.allows(*c))
                .ok_or_else(|| {
                    format!(
                        "Invalid capacity: '{}' for {}. Valid capacities are: {}",
                        raw,
                        catalog.name(series),
                        series
                            .capacities()
                            .iter()
                            .map(|c| c.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                })?,
        };

        let days = match self.days.as_deref() {
            None => DEFAULT_HISTORY_DAYS,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|d| (1..=MAX_HISTORY_DAYS).contains(d))
                .ok_or_else(|| {
                    format!(
                        "Invalid days: '{}'. Must be an integer between 1 and {}",
                        raw, MAX_HISTORY_DAYS
                    )
                })?,
        };

        Ok(ValidHistoryQuery {
            series,
            capacity,
            days,
        })
    }
}

/// Single price history point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// YYYY-MM-DD
    pub date: String,
    /// Epoch seconds
    pub timestamp: i64,
    pub price_min: i64,
    pub price_max: i64,
    pub price_avg: i64,
}

impl From<&HistoryRecord> for HistoryPoint {
    fn from(record: &HistoryRecord) -> Self {
        HistoryPoint {
            date: record.date.format("%Y-%m-%d").to_string(),
            timestamp: record.timestamp,
            price_min: record.price_min.get(),
            price_max: record.price_max.get(),
            price_avg: record.price_avg(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub series: String,
    pub capacity: Capacity,
    pub days: u32,
    /// Sorted ascending by timestamp
    pub history: Vec<HistoryPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(series: Option<&str>, capacity: Option<&str>, days: Option<&str>) -> HistoryQuery {
        HistoryQuery {
            series: series.map(String::from),
            capacity: capacity.map(String::from),
            days: days.map(String::from),
        }
    }

    #[test]
    fn test_defaults_when_absent() {
        let q = query(None, None, None).validate(&Catalog::default()).unwrap();
        assert_eq!(q.series, Series::Standard);
        assert_eq!(q.capacity, Capacity::Gb128);
        assert_eq!(q.days, DEFAULT_HISTORY_DAYS);
    }

    #[test]
    fn test_days_bounds() {
        let catalog = Catalog::default();
        assert!(query(None, None, Some("0")).validate(&catalog).is_err());
        assert!(query(None, None, Some("366")).validate(&catalog).is_err());
        assert!(query(None, None, Some("abc")).validate(&catalog).is_err());
        assert_eq!(query(None, None, Some("365")).validate(&catalog).unwrap().days, 365);
        assert_eq!(query(None, None, Some("1")).validate(&catalog).unwrap().days, 1);
    }

    #[test]
    fn test_error_names_parameter() {
        let catalog = Catalog::default();
        let err = query(Some("iPhone 99"), None, None).validate(&catalog).unwrap_err();
        assert!(err.contains("series"));
        let err = query(Some("iPhone 16 e"), Some("1TB"), None).validate(&catalog).unwrap_err();
        assert!(err.contains("capacity"));
        let err = query(None, None, Some("-3")).validate(&catalog).unwrap_err();
        assert!(err.contains("days"));
    }
}
