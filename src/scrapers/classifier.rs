use regex::Regex;

use crate::error::{ConfigError, SkipReason};
use crate::models::catalog::{Capacity, Catalog, Series};

/// Why the classifier refused a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    UnknownModel,
    InvalidCombination { series: Series, capacity: Capacity },
}

impl From<Rejected> for SkipReason {
    fn from(r: Rejected) -> Self {
        match r {
            Rejected::UnknownModel => SkipReason::UnknownModel,
            Rejected::InvalidCombination { .. } => SkipReason::InvalidCombination,
        }
    }
}

/// Ordered `(series, pattern)` rules, first match wins.
#[derive(Debug, Clone)]
pub struct ModelClassifier {
    rules: Vec<(Series, Regex)>,
}

/// Rule order: most specific variant first.
const RULE_ORDER: [Series; 5] = [
    Series::ProMax,
    Series::Pro,
    Series::Plus,
    Series::E,
    Series::Standard,
];

impl ModelClassifier {
    /// Build the rules for a product line such as `iPhone 16`.
    ///
    /// Tokens may be separated by spaces or hyphens (`iPhone-16 Pro`,
    /// `Series-Pro Max`) and matching ignores case.
    pub fn new(catalog: &Catalog) -> Result<Self, ConfigError> {
        let prefix = catalog
            .product_line()
            .split_whitespace()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(r"[\s-]*");

        let rules = RULE_ORDER
            .iter()
            .map(|series| {
                let suffix = match series {
                    Series::ProMax => r"[\s-]*Pro[\s-]*Max\b",
                    Series::Pro => r"[\s-]*Pro\b",
                    Series::Plus => r"[\s-]*Plus\b",
                    Series::E => r"[\s-]*e\b",
                    Series::Standard => r"\b",
                };
                Regex::new(&format!(r"(?i){}{}", prefix, suffix))
                    .map(|re| (*series, re))
                    .map_err(|e| ConfigError::invalid("scraper.product_line", e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rules })
    }

    /// Series named by the first matching rule.
    pub fn series_for(&self, model_text: &str) -> Option<Series> {
        self.rules
            .iter()
            .find(|(_, re)| re.is_match(model_text))
            .map(|(series, _)| *series)
    }

    /// Classify and check the capacity allow-list.
    pub fn classify(&self, model_text: &str, capacity: Capacity) -> Result<Series, Rejected> {
        let series = self.series_for(model_text).ok_or(Rejected::UnknownModel)?;
        if series.allows(capacity) {
            Ok(series)
        } else {
            Err(Rejected::InvalidCombination { series, capacity })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iphone() -> ModelClassifier {
        ModelClassifier::new(&Catalog::default()).unwrap()
    }

    #[test]
    fn test_specific_variants_win() {
        let c = iphone();
        assert_eq!(c.series_for("iPhone 16 Pro Max 256GB"), Some(Series::ProMax));
        assert_eq!(c.series_for("iPhone 16 Pro 256GB"), Some(Series::Pro));
        assert_eq!(c.series_for("iPhone 16 Plus 128GB"), Some(Series::Plus));
        assert_eq!(c.series_for("iPhone 16e 128GB"), Some(Series::E));
        assert_eq!(c.series_for("iPhone 16 e 128GB"), Some(Series::E));
        assert_eq!(c.series_for("iPhone 16 128GB 黒"), Some(Series::Standard));
    }

    #[test]
    fn test_hyphen_and_case() {
        let c = ModelClassifier::new(&Catalog::new("Series")).unwrap();
        assert_eq!(c.series_for("Series-Pro 256GB Black"), Some(Series::Pro));
        assert_eq!(c.series_for("Series-Pro Max 1TB Natural"), Some(Series::ProMax));
        assert_eq!(c.series_for("SERIES PRO MAX 1TB"), Some(Series::ProMax));
        assert_eq!(c.series_for("Series 128GB Black"), Some(Series::Standard));
    }

    #[test]
    fn test_other_generation_unknown() {
        let c = iphone();
        assert_eq!(c.series_for("iPhone 15 Pro 256GB"), None);
        assert_eq!(c.series_for("iPhone 160 128GB"), None);
        assert_eq!(c.classify("Galaxy S24 256GB", Capacity::Gb256), Err(Rejected::UnknownModel));
    }

    #[test]
    fn test_allow_list_rejection() {
        let c = iphone();
        assert_eq!(
            c.classify("iPhone 16 e 1TB", Capacity::Tb1),
            Err(Rejected::InvalidCombination { series: Series::E, capacity: Capacity::Tb1 })
        );
        assert_eq!(c.classify("iPhone 16 Pro 1TB", Capacity::Tb1), Ok(Series::Pro));
        assert!(c.classify("iPhone 16 Pro Max 128GB", Capacity::Gb128).is_err());
    }

    #[test]
    fn test_rule_name_matches_result_for_each_series() {
        let catalog = Catalog::default();
        let c = ModelClassifier::new(&catalog).unwrap();
        for series in Series::ALL {
            let text = format!("{} 256GB", catalog.name(series));
            assert_eq!(c.series_for(&text), Some(series), "{}", text);
        }
    }
}
