pub use super::archived_prices::Entity as ArchivedPrices;
pub use super::cache_stats::Entity as CacheStats;
pub use super::daily_rollups::Entity as DailyRollups;
pub use super::prices::Entity as Prices;
pub use super::tokens::Entity as Tokens;
