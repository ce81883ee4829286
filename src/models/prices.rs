//! Current price comparison models for GET /get_prices.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::catalog::Capacity;

/// Discount applied to the official price for the marketplace comparison (90%).
pub const RAKUTEN_DISCOUNT_NUMERATOR: i64 = 9;
pub const RAKUTEN_DISCOUNT_DENOMINATOR: i64 = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PricesQuery {
    pub series: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityComparison {
    pub official_price: i64,
    pub kaitori_price: i64,
    pub price_diff: i64,
    pub rakuten_diff: i64,
}

impl CapacityComparison {
    /// Differences that would overflow are reported as 0.
    pub fn new(official_price: i64, kaitori_price: i64) -> Self {
        let rakuten_diff = official_price
            .checked_mul(RAKUTEN_DISCOUNT_NUMERATOR)
            .map(|p| p.div_euclid(RAKUTEN_DISCOUNT_DENOMINATOR))
            .and_then(|discounted| kaitori_price.checked_sub(discounted))
            .unwrap_or(0);
        CapacityComparison {
            official_price,
            kaitori_price,
            price_diff: kaitori_price.checked_sub(official_price).unwrap_or(0),
            rakuten_diff,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentPricesResponse {
    pub series: String,
    pub prices: BTreeMap<Capacity, CapacityComparison>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rakuten_diff_floors_discount() {
        let c = CapacityComparison::new(124_800, 90_000);
        assert_eq!(c.price_diff, -34_800);
        assert_eq!(c.rakuten_diff, 90_000 - 112_320);

        let odd = CapacityComparison::new(99_999, 0);
        assert_eq!(odd.rakuten_diff, -89_999);
    }

    #[test]
    fn test_missing_data_is_zero() {
        let c = CapacityComparison::new(0, 0);
        assert_eq!(c, CapacityComparison { official_price: 0, kaitori_price: 0, price_diff: 0, rakuten_diff: 0 });
    }

    #[test]
    fn test_overflowing_official_price_does_not_panic() {
        let c = CapacityComparison::new(i64::MAX, 90_000);
        assert_eq!(c.rakuten_diff, 0);
        let c = CapacityComparison::new(i64::MIN, 90_000);
        assert_eq!(c.price_diff, 0);
    }
}
