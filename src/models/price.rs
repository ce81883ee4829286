use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Exclusive upper bound for a buy-back price, in JPY.
pub const MAX_PRICE_JPY: i64 = 2_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("price {0} outside (0, {MAX_PRICE_JPY})")]
pub struct PriceOutOfRange(pub i64);

/// A price in the smallest currency unit, guaranteed to lie in `(0, 2_000_000)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Price(i64);

impl Price {
    pub fn new(value: i64) -> Result<Self, PriceOutOfRange> {
        if value > 0 && value < MAX_PRICE_JPY {
            Ok(Price(value))
        } else {
            Err(PriceOutOfRange(value))
        }
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Price {
    type Error = PriceOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Price::new(value)
    }
}

impl From<Price> for i64 {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_exclusive() {
        assert!(Price::new(0).is_err());
        assert!(Price::new(-5).is_err());
        assert!(Price::new(MAX_PRICE_JPY).is_err());
        assert_eq!(Price::new(1).unwrap().get(), 1);
        assert_eq!(Price::new(MAX_PRICE_JPY - 1).unwrap().get(), 1_999_999);
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<Price>("85000").is_ok());
        assert!(serde_json::from_str::<Price>("0").is_err());
    }
}
