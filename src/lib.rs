//! price-scout - cross-marketplace price comparison for a single
//! product.
//!
//! Given a product identifier and the marketplace it was seen on, the
//! engine fetches the product page from every other registered regional
//! storefront, extracts price / availability / shipping, converts all
//! totals into one requested currency and returns a ranked comparison.
//!
//! Layering follows clean architecture: `domain` holds the data model
//! and error types, `application` the orchestration, `infrastructure`
//! the HTTP, HTML, cache, currency, config and logging services.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{ComparisonEngine, EngineSettings};
pub use domain::{
    CompareError, CompareOptions, ComparisonResult, CurrencyCode, Listing, Marketplace,
    MarketplaceId, MarketplaceRegistry, ProductId, RankedAlternative,
};
pub use infrastructure::{
    AppConfig, ConfigManager, CurrencyConverter, DocumentFetcher, ListingExtractor, PriceCache,
};
