//! Product catalog: the closed set of series for one product generation and
//! the capacities each series is sold in.
//!
//! Series names are derived from the configured product line, so the same
//! enumeration serves `iPhone 16`, `iPhone 16 Pro Max`, ... or any other
//! generation prefix an operator configures.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage capacity tokens. Declaration order is size order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capacity {
    #[serde(rename = "128GB")]
    Gb128,
    #[serde(rename = "256GB")]
    Gb256,
    #[serde(rename = "512GB")]
    Gb512,
    #[serde(rename = "1TB")]
    Tb1,
    #[serde(rename = "2TB")]
    Tb2,
}

impl Capacity {
    pub const ALL: [Capacity; 5] = [
        Capacity::Gb128,
        Capacity::Gb256,
        Capacity::Gb512,
        Capacity::Tb1,
        Capacity::Tb2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capacity::Gb128 => "128GB",
            Capacity::Gb256 => "256GB",
            Capacity::Gb512 => "512GB",
            Capacity::Tb1 => "1TB",
            Capacity::Tb2 => "2TB",
        }
    }

    /// Build a capacity from an amount and a unit letter (`G` or `T`).
    ///
    /// `1GB` is a known vendor typo for `1TB` and is normalized here.
    pub fn from_parts(amount: u32, unit: char) -> Option<Self> {
        match (amount, unit.to_ascii_uppercase()) {
            (128, 'G') => Some(Capacity::Gb128),
            (256, 'G') => Some(Capacity::Gb256),
            (512, 'G') => Some(Capacity::Gb512),
            (1, 'T') | (1, 'G') => Some(Capacity::Tb1),
            (2, 'T') => Some(Capacity::Tb2),
            _ => None,
        }
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capacity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();
        let (digits, unit) = if let Some(n) = upper.strip_suffix("GB") {
            (n, 'G')
        } else if let Some(n) = upper.strip_suffix("TB") {
            (n, 'T')
        } else {
            return Err(format!("Invalid capacity: '{}'", trimmed));
        };

        digits
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(|amount| Capacity::from_parts(amount, unit))
            .ok_or_else(|| format!("Invalid capacity: '{}'", trimmed))
    }
}

/// Series within one product generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Series {
    Standard,
    Plus,
    Pro,
    ProMax,
    E,
}

impl Series {
    /// Listing order used by the Read API and the catalog.
    pub const ALL: [Series; 5] = [
        Series::Standard,
        Series::Plus,
        Series::Pro,
        Series::ProMax,
        Series::E,
    ];

    /// Capacity allow-list for this series.
    pub fn capacities(&self) -> &'static [Capacity] {
        match self {
            Series::Standard | Series::Plus | Series::E => {
                &[Capacity::Gb128, Capacity::Gb256, Capacity::Gb512]
            }
            Series::Pro => &[
                Capacity::Gb128,
                Capacity::Gb256,
                Capacity::Gb512,
                Capacity::Tb1,
            ],
            Series::ProMax => &[Capacity::Gb256, Capacity::Gb512, Capacity::Tb1],
        }
    }

    pub fn allows(&self, capacity: Capacity) -> bool {
        self.capacities().contains(&capacity)
    }

    fn suffix(&self) -> &'static str {
        match self {
            Series::Standard => "",
            Series::Plus => " Plus",
            Series::Pro => " Pro",
            Series::ProMax => " Pro Max",
            Series::E => " e",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    product_line: String,
}

impl Catalog {
    pub fn new(product_line: impl Into<String>) -> Self {
        let product_line = product_line.into().split_whitespace().collect::<Vec<_>>().join(" ");
        Self { product_line }
    }

    pub fn product_line(&self) -> &str {
        &self.product_line
    }

    /// Canonical display name, e.g. `iPhone 16 Pro Max`.
    pub fn name(&self, series: Series) -> String {
        format!("{}{}", self.product_line, series.suffix())
    }

    /// Alternate spelling some sources use for the `e` model (`iPhone 16e`).
    pub fn alternate_name(&self, series: Series) -> Option<String> {
        match series {
            Series::E => Some(format!("{}e", self.product_line)),
            _ => None,
        }
    }

    pub fn names(&self) -> Vec<String> {
        Series::ALL.iter().map(|s| self.name(*s)).collect()
    }

    /// Resolve a series name (canonical or alternate spelling).
    pub fn parse_series(&self, name: &str) -> Option<Series> {
        let normalized = name.split_whitespace().collect::<Vec<_>>().join(" ");
        Series::ALL.into_iter().find(|series| {
            self.name(*series) == normalized
                || self.alternate_name(*series).as_deref() == Some(normalized.as_str())
        })
    }

    pub fn is_allowed(&self, series: Series, capacity: Capacity) -> bool {
        series.allows(capacity)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog::new("iPhone 16")
    }
}
