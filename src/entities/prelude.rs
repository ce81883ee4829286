pub use super::current_prices::Entity as CurrentPrices;
pub use super::official_prices::Entity as OfficialPrices;
pub use super::price_history::Entity as PriceHistory;
