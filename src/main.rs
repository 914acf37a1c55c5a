//! Command line entry point.
//!
//! Usage: `price-scout <PRODUCT_ID> <ORIGIN_MARKETPLACE> [CURRENCY]`
//!
//! Runs one comparison and prints the ranked result as pretty JSON.
//! Configuration is read from the user config directory and created
//! with defaults on first run.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use tracing::info;

use price_scout::application::{ComparisonEngine, EngineSettings};
use price_scout::domain::{CompareOptions, CurrencyCode, MarketplaceId, MarketplaceRegistry, ProductId};
use price_scout::infrastructure::{
    logging::init_logging, ConfigManager, CurrencyConverter, DocumentFetcher, ListingExtractor,
    PriceCache,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (raw_product, raw_origin, raw_currency) = match args.as_slice() {
        [product, origin] => (product, origin, None),
        [product, origin, currency] => (product, origin, Some(currency.as_str())),
        _ => bail!("usage: price-scout <PRODUCT_ID> <ORIGIN_MARKETPLACE> [CURRENCY]"),
    };

    let config_manager = ConfigManager::new()?;
    let config = config_manager.load_config().await?;
    init_logging(&config.logging)?;

    let product_id = ProductId::new(raw_product.as_str())?;
    let origin = MarketplaceId::new(raw_origin.as_str());
    let requester_currency = CurrencyCode::new(
        raw_currency.unwrap_or(config.comparison.requester_currency.as_str()),
    );

    let registry = Arc::new(MarketplaceRegistry::builtin());
    let fetcher = Arc::new(DocumentFetcher::with_http(config.fetcher.clone())?);
    let converter = Arc::new(CurrencyConverter::with_default_provider(
        Duration::from_secs(config.cache.rates_ttl_minutes * 60),
    )?);
    let price_cache = Arc::new(PriceCache::new(Duration::from_secs(
        config.cache.listing_ttl_minutes * 60,
    )));
    let engine = ComparisonEngine::new(
        registry,
        fetcher,
        Arc::new(ListingExtractor::new()),
        price_cache,
        converter,
        EngineSettings {
            per_marketplace_timeout: Duration::from_millis(
                config.comparison.per_marketplace_timeout_ms,
            ),
            result_ttl: Duration::from_secs(config.cache.result_ttl_minutes * 60),
        },
    );

    let options = CompareOptions {
        include_shipping: config.comparison.include_shipping,
        enabled_marketplaces: if config.comparison.enabled_marketplaces.is_empty() {
            None
        } else {
            Some(
                config
                    .comparison
                    .enabled_marketplaces
                    .iter()
                    .map(|id| MarketplaceId::new(id.as_str()))
                    .collect(),
            )
        },
    };

    let result = engine
        .compare(&product_id, &origin, &requester_currency, &options)
        .await?;

    let threshold = Decimal::from_f64_retain(config.comparison.price_drop_threshold_percent)
        .unwrap_or(Decimal::ZERO);
    if let Some(percent) = result.savings_percent() {
        if percent >= threshold {
            info!(
                product = %product_id,
                percent = %percent,
                threshold = config.comparison.price_drop_threshold_percent,
                "savings exceed the price-drop notification threshold"
            );
        }
    }

    let json = serde_json::to_string_pretty(&result).context("failed to serialize result")?;
    println!("{json}");
    Ok(())
}
