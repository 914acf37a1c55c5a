//! Cross-marketplace comparison orchestrator
//!
//! Fans one lookup task out per candidate marketplace, each following
//! the same explicit path: price cache, then fetch, then extract, then
//! cache the fresh listing. Every task races a per-marketplace timeout;
//! marketplaces that fail or run late are excluded from the result and
//! logged, never fatal. Successful listings are converted into the
//! requester's currency and ranked deterministically.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::domain::{
    CompareError, CompareOptions, ComparisonResult, CurrencyCode, FetchError, Listing,
    Marketplace, MarketplaceId, MarketplaceRegistry, ProductId, RankedAlternative,
};
use crate::infrastructure::{CurrencyConverter, DocumentFetcher, ListingExtractor, PriceCache};
use crate::infrastructure::price_cache::TtlCache;

/// Engine-level tuning, usually derived from
/// [`crate::infrastructure::AppConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Upper bound on one marketplace lookup inside a comparison.
    pub per_marketplace_timeout: Duration,
    /// TTL of the outer per-product result cache.
    pub result_ttl: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            per_marketplace_timeout: Duration::from_secs(8),
            result_ttl: Duration::from_secs(5 * 60),
        }
    }
}

/// Terminal state of one per-marketplace lookup. Failures carry the
/// reason so exclusion is observable, never silent.
#[derive(Debug, Clone)]
enum MarketplaceOutcome {
    /// Served from the price cache.
    Hit(Listing),
    /// Fetched, extracted and cached during this comparison.
    Fetched(Listing),
    /// Excluded from the result.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SkipReason {
    Timeout,
    NotFound,
    FetchFailed(String),
    NoPrice,
    Unavailable,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Timeout => write!(f, "timed out"),
            SkipReason::NotFound => write!(f, "product not listed"),
            SkipReason::FetchFailed(message) => write!(f, "fetch failed: {message}"),
            SkipReason::NoPrice => write!(f, "no price extracted"),
            SkipReason::Unavailable => write!(f, "listed but unavailable"),
        }
    }
}

/// The comparison engine. All collaborating services are injected so
/// lifecycle and test isolation stay controllable; one engine instance
/// is expected per running process.
pub struct ComparisonEngine {
    registry: Arc<MarketplaceRegistry>,
    fetcher: Arc<DocumentFetcher>,
    extractor: Arc<ListingExtractor>,
    price_cache: Arc<PriceCache>,
    converter: Arc<CurrencyConverter>,
    result_cache: TtlCache<ProductId, ComparisonResult>,
    settings: EngineSettings,
}

impl ComparisonEngine {
    pub fn new(
        registry: Arc<MarketplaceRegistry>,
        fetcher: Arc<DocumentFetcher>,
        extractor: Arc<ListingExtractor>,
        price_cache: Arc<PriceCache>,
        converter: Arc<CurrencyConverter>,
        settings: EngineSettings,
    ) -> Self {
        let result_cache = TtlCache::new(settings.result_ttl);
        Self {
            registry,
            fetcher,
            extractor,
            price_cache,
            converter,
            result_cache,
            settings,
        }
    }

    /// Compare `product_id` across every registered marketplace except
    /// the origin, returning a ranked result in `requester_currency`.
    ///
    /// Zero alternatives is a normal, reportable outcome; the only
    /// errors are structural (unknown origin marketplace).
    pub async fn compare(
        &self,
        product_id: &ProductId,
        origin_marketplace: &MarketplaceId,
        requester_currency: &CurrencyCode,
        options: &CompareOptions,
    ) -> Result<ComparisonResult, CompareError> {
        let origin = self.registry.get(origin_marketplace)?.clone();

        if let Some(cached) = self.result_cache.get(product_id).await {
            if cached.origin_marketplace == *origin_marketplace
                && cached.requester_currency == *requester_currency
                && cached.include_shipping == options.include_shipping
            {
                debug!(product = %product_id, "serving comparison from result cache");
                return Ok(cached);
            }
        }

        let candidates: Vec<Marketplace> = self
            .registry
            .all()
            .filter(|m| m.id != origin.id)
            .filter(|m| match &options.enabled_marketplaces {
                Some(enabled) => enabled.contains(&m.id),
                None => true,
            })
            .cloned()
            .collect();

        info!(
            product = %product_id,
            origin = %origin.id,
            candidates = candidates.len(),
            "starting price comparison"
        );

        // Origin listing and all candidates resolve concurrently; the
        // fetcher's pool bounds actual network parallelism.
        let origin_task = self.resolve_with_timeout(product_id, &origin);
        let candidate_tasks = candidates
            .iter()
            .map(|marketplace| self.resolve_with_timeout(product_id, marketplace));
        let (origin_outcome, candidate_outcomes) =
            futures::join!(origin_task, join_all(candidate_tasks));

        let mut alternatives = Vec::new();
        for (marketplace, outcome) in candidates.iter().zip(candidate_outcomes) {
            match outcome {
                MarketplaceOutcome::Hit(listing) | MarketplaceOutcome::Fetched(listing) => {
                    if !listing.available {
                        debug!(marketplace = %marketplace.id, reason = %SkipReason::Unavailable, "marketplace excluded");
                        continue;
                    }
                    let converted_total = self
                        .comparison_total(&listing, requester_currency, options.include_shipping)
                        .await;
                    alternatives.push(RankedAlternative {
                        listing,
                        converted_total,
                    });
                }
                MarketplaceOutcome::Skipped(reason) => {
                    debug!(marketplace = %marketplace.id, reason = %reason, "marketplace excluded");
                }
            }
        }

        let origin_ranked = match origin_outcome {
            MarketplaceOutcome::Hit(listing) | MarketplaceOutcome::Fetched(listing) => {
                let converted_total = self
                    .comparison_total(&listing, requester_currency, options.include_shipping)
                    .await;
                Some(RankedAlternative {
                    listing,
                    converted_total,
                })
            }
            MarketplaceOutcome::Skipped(reason) => {
                warn!(marketplace = %origin.id, reason = %reason, "origin listing unavailable");
                None
            }
        };

        let result = ComparisonResult::ranked(
            product_id.clone(),
            origin.id.clone(),
            requester_currency.clone(),
            options.include_shipping,
            origin_ranked,
            alternatives,
        );

        info!(
            product = %product_id,
            alternatives = result.alternatives.len(),
            best = result.best_price.as_ref().map(|b| b.listing.marketplace_id.to_string()),
            savings = result.savings.map(|s| s.to_string()),
            "comparison complete"
        );

        self.result_cache
            .insert(product_id.clone(), result.clone())
            .await;
        Ok(result)
    }

    /// Sweep expired entries from the listing and result caches.
    /// Intended to run on a fixed schedule driven by the caller.
    pub async fn purge_expired(&self) -> usize {
        self.price_cache.purge_expired().await + self.result_cache.purge_expired().await
    }

    /// One marketplace branch raced against the per-marketplace
    /// timeout. The timeout resolves the branch to a skip; it does not
    /// cancel the underlying network call, whose resources are released
    /// by the retrieval layer independently.
    async fn resolve_with_timeout(
        &self,
        product_id: &ProductId,
        marketplace: &Marketplace,
    ) -> MarketplaceOutcome {
        match tokio::time::timeout(
            self.settings.per_marketplace_timeout,
            self.resolve_listing(product_id, marketplace),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => MarketplaceOutcome::Skipped(SkipReason::Timeout),
        }
    }

    /// Cache -> fetch -> extract -> cache. Every terminal state is an
    /// explicit value; nothing here ever propagates an error upward.
    async fn resolve_listing(
        &self,
        product_id: &ProductId,
        marketplace: &Marketplace,
    ) -> MarketplaceOutcome {
        if let Some(listing) = self.price_cache.get(product_id, &marketplace.id).await {
            debug!(marketplace = %marketplace.id, "listing served from cache");
            return MarketplaceOutcome::Hit(listing);
        }

        let document = match self.fetcher.fetch(marketplace, product_id).await {
            Ok(document) => document,
            Err(FetchError::NotFound) => {
                return MarketplaceOutcome::Skipped(SkipReason::NotFound)
            }
            Err(FetchError::Timeout) => return MarketplaceOutcome::Skipped(SkipReason::Timeout),
            Err(err) => {
                return MarketplaceOutcome::Skipped(SkipReason::FetchFailed(err.to_string()))
            }
        };

        match self.extractor.extract(&document, marketplace) {
            Ok(listing) => {
                self.price_cache.put(listing.clone()).await;
                MarketplaceOutcome::Fetched(listing)
            }
            Err(err) => {
                debug!(marketplace = %marketplace.id, error = %err, "extraction produced no listing");
                MarketplaceOutcome::Skipped(SkipReason::NoPrice)
            }
        }
    }

    /// Ranking key: converted price, plus converted shipping when it is
    /// both configured and known. Unknown shipping contributes nothing
    /// (it is not the same as free).
    async fn comparison_total(
        &self,
        listing: &Listing,
        requester_currency: &CurrencyCode,
        include_shipping: bool,
    ) -> Decimal {
        let mut total = self
            .converter
            .convert(listing.price, &listing.currency, requester_currency)
            .await;
        if include_shipping {
            if let Some(shipping) = listing.shipping_cost {
                total += self
                    .converter
                    .convert(shipping, &listing.currency, requester_currency)
                    .await;
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    use crate::infrastructure::currency::RateProvider;
    use crate::infrastructure::fetcher::{DocumentRetriever, FetcherConfig};

    #[derive(Clone)]
    enum Page {
        Html(String),
        NotFound,
        Broken,
    }

    /// Retriever serving a fixed page per storefront host.
    struct PageMap {
        pages: HashMap<String, Page>,
        calls: AtomicUsize,
    }

    impl PageMap {
        fn new(pages: &[(&str, Page)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(host, page)| (host.to_string(), page.clone()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentRetriever for PageMap {
        async fn retrieve(
            &self,
            url: &str,
            _headers: &[(&str, String)],
        ) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let host = url
                .strip_prefix("https://")
                .and_then(|rest| rest.split('/').next())
                .unwrap_or_default();
            match self.pages.get(host) {
                Some(Page::Html(body)) => Ok(body.clone()),
                Some(Page::NotFound) | None => Err(FetchError::NotFound),
                Some(Page::Broken) => Err(FetchError::Http { status: 500 }),
            }
        }
    }

    /// The fallback rate table is all the engine tests need.
    struct OfflineRates;

    #[async_trait]
    impl RateProvider for OfflineRates {
        async fn fetch_rates(
            &self,
            _pivot: &CurrencyCode,
        ) -> anyhow::Result<HashMap<CurrencyCode, Decimal>> {
            anyhow::bail!("offline")
        }
    }

    fn product_page(price: &str) -> Page {
        Page::Html(format!(
            r#"<html><body>
                 <span id="productTitle"> Widget </span>
                 <div id="corePrice_feature_div">
                   <span class="a-price"><span class="a-offscreen">{price}</span></span>
                 </div>
                 <div id="availability"><span>In stock</span></div>
               </body></html>"#
        ))
    }

    fn unavailable_page(price: &str) -> Page {
        Page::Html(format!(
            r#"<html><body>
                 <div id="corePrice_feature_div">
                   <span class="a-price"><span class="a-offscreen">{price}</span></span>
                 </div>
                 <div id="availability"><span>Currently unavailable.</span></div>
               </body></html>"#
        ))
    }

    fn engine(retriever: Arc<PageMap>) -> ComparisonEngine {
        let config = FetcherConfig {
            max_retries: 0,
            retry_base_delay_ms: 1,
            max_requests_per_second: 1_000,
            ..Default::default()
        };
        ComparisonEngine::new(
            Arc::new(MarketplaceRegistry::builtin()),
            Arc::new(DocumentFetcher::new(retriever, config).unwrap()),
            Arc::new(crate::infrastructure::ListingExtractor::new()),
            Arc::new(crate::infrastructure::PriceCache::new(Duration::from_secs(60))),
            Arc::new(CurrencyConverter::new(
                Arc::new(OfflineRates),
                "EUR".into(),
                Duration::from_secs(3600),
            )),
            EngineSettings::default(),
        )
    }

    fn product() -> ProductId {
        ProductId::new("B000TEST01").unwrap()
    }

    fn only(ids: &[&str]) -> CompareOptions {
        CompareOptions {
            enabled_marketplaces: Some(ids.iter().map(|id| MarketplaceId::new(*id)).collect::<HashSet<_>>()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn ranks_alternatives_and_reports_savings() {
        let retriever = Arc::new(PageMap::new(&[
            ("amazon.fr", product_page("30,00 €")),
            ("amazon.de", product_page("25,00 €")),
            ("amazon.it", product_page("28,50 €")),
        ]));
        let engine = engine(retriever);

        let result = engine
            .compare(
                &product(),
                &"amazon.fr".into(),
                &"EUR".into(),
                &only(&["amazon.de", "amazon.it"]),
            )
            .await
            .unwrap();

        assert_eq!(result.alternatives.len(), 2);
        let best = result.best_price.as_ref().unwrap();
        assert_eq!(best.listing.marketplace_id, "amazon.de".into());
        assert_eq!(best.converted_total, dec!(25.00));
        assert_eq!(result.origin.as_ref().unwrap().converted_total, dec!(30.00));
        assert_eq!(result.savings, Some(dec!(5.00)));
    }

    #[tokio::test]
    async fn converts_foreign_currencies_into_the_requester_currency() {
        // Fallback table: 1 EUR = 0.85 GBP, so £17 is 20 EUR.
        let retriever = Arc::new(PageMap::new(&[
            ("amazon.fr", product_page("30,00 €")),
            ("amazon.co.uk", product_page("£17.00")),
        ]));
        let engine = engine(retriever);

        let result = engine
            .compare(
                &product(),
                &"amazon.fr".into(),
                &"EUR".into(),
                &only(&["amazon.co.uk"]),
            )
            .await
            .unwrap();

        let best = result.best_price.as_ref().unwrap();
        assert_eq!(best.listing.currency, "GBP".into());
        assert_eq!(best.listing.price, dec!(17.00));
        assert_eq!(best.converted_total, dec!(20.00));
        assert_eq!(result.savings, Some(dec!(10.00)));
    }

    #[tokio::test]
    async fn failed_marketplaces_are_excluded_not_fatal() {
        let retriever = Arc::new(PageMap::new(&[
            ("amazon.fr", product_page("30,00 €")),
            ("amazon.de", Page::NotFound),
            ("amazon.it", Page::Broken),
            ("amazon.es", unavailable_page("19,99 €")),
            ("amazon.nl", product_page("27,00 €")),
        ]));
        let engine = engine(retriever);

        let result = engine
            .compare(
                &product(),
                &"amazon.fr".into(),
                &"EUR".into(),
                &only(&["amazon.de", "amazon.it", "amazon.es", "amazon.nl"]),
            )
            .await
            .unwrap();

        // Only the available, resolvable storefront survives.
        assert_eq!(result.alternatives.len(), 1);
        assert_eq!(
            result.alternatives[0].listing.marketplace_id,
            "amazon.nl".into()
        );
    }

    #[tokio::test]
    async fn zero_alternatives_is_a_result_not_an_error() {
        let retriever = Arc::new(PageMap::new(&[("amazon.fr", product_page("30,00 €"))]));
        let engine = engine(retriever);

        let result = engine
            .compare(
                &product(),
                &"amazon.fr".into(),
                &"EUR".into(),
                &only(&["amazon.de", "amazon.it"]),
            )
            .await
            .unwrap();

        assert!(!result.has_alternatives());
        assert!(result.best_price.is_none());
        assert!(result.savings.is_none());
        assert!(result.origin.is_some());
    }

    #[tokio::test]
    async fn missing_origin_listing_yields_no_savings() {
        let retriever = Arc::new(PageMap::new(&[("amazon.de", product_page("25,00 €"))]));
        let engine = engine(retriever);

        let result = engine
            .compare(
                &product(),
                &"amazon.fr".into(),
                &"EUR".into(),
                &only(&["amazon.de"]),
            )
            .await
            .unwrap();

        assert!(result.origin.is_none());
        assert!(result.savings.is_none());
        assert!(result.best_price.is_some());
    }

    #[tokio::test]
    async fn unknown_origin_marketplace_is_an_error() {
        let retriever = Arc::new(PageMap::new(&[]));
        let engine = engine(retriever);

        let err = engine
            .compare(
                &product(),
                &"amazon.example".into(),
                &"EUR".into(),
                &CompareOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CompareError::UnknownMarketplace(_)));
    }

    #[tokio::test]
    async fn repeat_comparison_is_served_from_the_result_cache() {
        let retriever = Arc::new(PageMap::new(&[
            ("amazon.fr", product_page("30,00 €")),
            ("amazon.de", product_page("25,00 €")),
        ]));
        let engine = engine(Arc::clone(&retriever));
        let options = only(&["amazon.de"]);

        let first = engine
            .compare(&product(), &"amazon.fr".into(), &"EUR".into(), &options)
            .await
            .unwrap();
        let fetches_after_first = retriever.calls.load(Ordering::SeqCst);

        let second = engine
            .compare(&product(), &"amazon.fr".into(), &"EUR".into(), &options)
            .await
            .unwrap();

        assert_eq!(retriever.calls.load(Ordering::SeqCst), fetches_after_first);
        assert_eq!(first.generated_at, second.generated_at);
    }

    #[tokio::test]
    async fn result_cache_is_bypassed_when_the_request_shape_differs() {
        let retriever = Arc::new(PageMap::new(&[
            ("amazon.fr", product_page("30,00 €")),
            ("amazon.co.uk", product_page("£17.00")),
        ]));
        let engine = engine(retriever);
        let options = only(&["amazon.co.uk"]);

        let in_eur = engine
            .compare(&product(), &"amazon.fr".into(), &"EUR".into(), &options)
            .await
            .unwrap();
        let in_gbp = engine
            .compare(&product(), &"amazon.fr".into(), &"GBP".into(), &options)
            .await
            .unwrap();

        assert_eq!(in_eur.requester_currency, "EUR".into());
        assert_eq!(in_gbp.requester_currency, "GBP".into());
        // £17 stays £17 once totals are expressed in GBP.
        assert_eq!(
            in_gbp.best_price.as_ref().unwrap().converted_total,
            dec!(17.00)
        );
    }

    #[tokio::test]
    async fn slow_marketplaces_are_dropped_after_the_timeout() {
        struct Stalling;

        #[async_trait]
        impl DocumentRetriever for Stalling {
            async fn retrieve(
                &self,
                url: &str,
                _headers: &[(&str, String)],
            ) -> Result<String, FetchError> {
                if url.contains("amazon.de") {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                match product_page("30,00 €") {
                    Page::Html(body) => Ok(body),
                    _ => unreachable!(),
                }
            }
        }

        let config = FetcherConfig {
            max_retries: 0,
            max_requests_per_second: 1_000,
            ..Default::default()
        };
        let engine = ComparisonEngine::new(
            Arc::new(MarketplaceRegistry::builtin()),
            Arc::new(DocumentFetcher::new(Arc::new(Stalling), config).unwrap()),
            Arc::new(crate::infrastructure::ListingExtractor::new()),
            Arc::new(crate::infrastructure::PriceCache::new(Duration::from_secs(60))),
            Arc::new(CurrencyConverter::new(
                Arc::new(OfflineRates),
                "EUR".into(),
                Duration::from_secs(3600),
            )),
            EngineSettings {
                per_marketplace_timeout: Duration::from_millis(100),
                ..Default::default()
            },
        );

        let result = engine
            .compare(
                &product(),
                &"amazon.fr".into(),
                &"EUR".into(),
                &only(&["amazon.de", "amazon.it"]),
            )
            .await
            .unwrap();

        assert_eq!(result.alternatives.len(), 1);
        assert_eq!(
            result.alternatives[0].listing.marketplace_id,
            "amazon.it".into()
        );
    }
}
