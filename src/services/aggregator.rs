//! Groups row observations of one cycle into one record per (series, capacity).
//!
//! This is also the single place where skipped rows are accounted for.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::SkipReason;
use crate::models::catalog::{Capacity, Series};
use crate::models::price::Price;
use crate::models::records::CurrentPriceRecord;
use crate::scrapers::RowOutcome;

/// Source label when more than one vendor contributed to a record.
pub const MULTI_SOURCE: &str = "multi";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowCounters {
    pub rows_seen: u64,
    pub rows_accepted: u64,
    pub skipped: BTreeMap<SkipReason, u64>,
}

impl RowCounters {
    pub fn parse_errors(&self) -> u64 {
        self.skipped
            .iter()
            .filter(|(reason, _)| !reason.is_validation())
            .map(|(_, n)| n)
            .sum()
    }

    pub fn validation_errors(&self) -> u64 {
        self.skipped
            .iter()
            .filter(|(reason, _)| reason.is_validation())
            .map(|(_, n)| n)
            .sum()
    }
}

#[derive(Debug)]
struct Accumulator {
    colors: BTreeMap<String, Price>,
    min: Price,
    max: Price,
    sources: BTreeSet<String>,
}

impl Accumulator {
    fn new(color: String, price: Price, source: String) -> Self {
        Self {
            colors: BTreeMap::from([(color, price)]),
            min: price,
            max: price,
            sources: BTreeSet::from([source]),
        }
    }

    fn add(&mut self, color: String, price: Price, source: String) {
        self.colors
            .entry(color)
            .and_modify(|p| *p = (*p).min(price))
            .or_insert(price);
        self.min = self.min.min(price);
        self.max = self.max.max(price);
        self.sources.insert(source);
    }

    fn source(&self) -> String {
        match self.sources.len() {
            1 => self.sources.iter().next().cloned().unwrap_or_default(),
            _ => MULTI_SOURCE.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct Aggregator {
    cycle_at: DateTime<Utc>,
    groups: BTreeMap<(Series, Capacity), Accumulator>,
    counters: RowCounters,
}

impl Aggregator {
    pub fn new(cycle_at: DateTime<Utc>) -> Self {
        Self {
            cycle_at,
            groups: BTreeMap::new(),
            counters: RowCounters::default(),
        }
    }

    pub fn ingest(&mut self, outcome: RowOutcome) {
        self.counters.rows_seen += 1;

        match outcome {
            RowOutcome::Accepted {
                series,
                capacity,
                color,
                price,
                source,
            } => {
                self.counters.rows_accepted += 1;
                match self.groups.get_mut(&(series, capacity)) {
                    Some(acc) => acc.add(color, price, source),
                    None => {
                        self.groups
                            .insert((series, capacity), Accumulator::new(color, price, source));
                    }
                }
            }
            RowOutcome::Skipped(reason) => {
                debug!(reason = %reason, "Row skipped");
                *self.counters.skipped.entry(reason).or_insert(0) += 1;
            }
        }
    }

    pub fn counters(&self) -> &RowCounters {
        &self.counters
    }

    /// Records ordered by (series, capacity), all stamped with the cycle time.
    pub fn finish(self) -> (Vec<CurrentPriceRecord>, RowCounters) {
        let cycle_at = self.cycle_at;
        let records = self
            .groups
            .into_iter()
            .map(|((series, capacity), acc)| {
                let source = acc.source();
                CurrentPriceRecord {
                    series,
                    capacity,
                    colors: acc.colors,
                    kaitori_price_min: acc.min,
                    kaitori_price_max: acc.max,
                    source,
                    updated_at: cycle_at,
                }
            })
            .collect();

        (records, self.counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted(series: Series, capacity: Capacity, color: &str, price: i64, source: &str) -> RowOutcome {
        RowOutcome::Accepted {
            series,
            capacity,
            color: color.to_string(),
            price: Price::new(price).unwrap(),
            source: source.to_string(),
        }
    }

    #[test]
    fn test_two_colors_same_key() {
        let mut agg = Aggregator::new(Utc::now());
        agg.ingest(accepted(Series::Standard, Capacity::Gb128, "Black", 50_000, "v"));
        agg.ingest(accepted(Series::Standard, Capacity::Gb128, "White", 48_500, "v"));

        let (records, counters) = agg.finish();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.colors["Black"].get(), 50_000);
        assert_eq!(r.colors["White"].get(), 48_500);
        assert_eq!(r.kaitori_price_min.get(), 48_500);
        assert_eq!(r.kaitori_price_max.get(), 50_000);
        assert_eq!(r.source, "v");
        assert_eq!(counters.rows_accepted, 2);
    }

    #[test]
    fn test_color_collision_lower_wins_in_any_order() {
        let rows = [
            accepted(Series::Pro, Capacity::Gb256, "Black", 90_000, "a"),
            accepted(Series::Pro, Capacity::Gb256, "Black", 85_000, "b"),
        ];

        let mut forward = Aggregator::new(Utc::now());
        let mut backward = Aggregator::new(Utc::now());
        for r in rows.iter().cloned() {
            forward.ingest(r);
        }
        for r in rows.iter().rev().cloned() {
            backward.ingest(r);
        }

        let (f, _) = forward.finish();
        let (b, _) = backward.finish();
        assert_eq!(f[0].colors["Black"].get(), 85_000);
        assert_eq!(f[0].colors, b[0].colors);
        assert_eq!(f[0].source, MULTI_SOURCE);
        assert_eq!(f[0].kaitori_price_max.get(), 90_000);
    }

    #[test]
    fn test_skips_are_counted() {
        let mut agg = Aggregator::new(Utc::now());
        agg.ingest(RowOutcome::Skipped(SkipReason::InvalidCombination));
        agg.ingest(RowOutcome::Skipped(SkipReason::MissingModel));
        agg.ingest(accepted(Series::Pro, Capacity::Tb1, "unknown", 150_000, "v"));

        let counters = agg.counters().clone();
        assert_eq!(counters.rows_seen, 3);
        assert_eq!(counters.rows_accepted, 1);
        assert_eq!(counters.validation_errors(), 1);
        assert_eq!(counters.parse_errors(), 1);
    }

    #[test]
    fn test_records_share_cycle_timestamp() {
        let t = Utc::now();
        let mut agg = Aggregator::new(t);
        agg.ingest(accepted(Series::Pro, Capacity::Gb256, "Black", 85_000, "v"));
        agg.ingest(accepted(Series::ProMax, Capacity::Tb1, "Natural", 165_000, "v"));
        let (records, _) = agg.finish();
        assert!(records.iter().all(|r| r.updated_at == t));
        assert!(records.iter().all(|r| r.kaitori_price_min <= r.kaitori_price_max));
    }
}
