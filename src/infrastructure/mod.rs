//! Infrastructure module - fetching, extraction, caching, currency,
//! configuration and logging.

pub mod config;
pub mod currency;
pub mod extraction;
pub mod fetcher;
pub mod logging;
pub mod price_cache;

pub use config::{AppConfig, CacheConfig, ComparisonConfig, ConfigManager, LoggingConfig};
pub use currency::{CurrencyConverter, ExchangeRateApi, ExchangeRateTable, RateProvider};
pub use extraction::ListingExtractor;
pub use fetcher::{DocumentFetcher, DocumentRetriever, FetcherConfig, HttpRetriever};
pub use price_cache::{PriceCache, TtlCache};
