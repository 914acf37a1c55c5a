//! Currency conversion through a pivot currency
//!
//! All exchange rates are expressed against a single pivot (EUR); any
//! pair converts via two hops. The rate table refreshes on a TTL from a
//! pluggable [`RateProvider`]; refresh failures never surface to
//! callers - the converter keeps the last good table, which starts out
//! as a built-in fallback so the table is never empty for currencies in
//! the marketplace registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::CurrencyCode;

/// Source of fresh exchange rates against a pivot currency.
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_rates(&self, pivot: &CurrencyCode) -> Result<HashMap<CurrencyCode, Decimal>>;
}

/// exchangerate-api.com JSON endpoint
/// (`GET /v4/latest/{pivot}` returning `{ "rates": { code: number } }`).
pub struct ExchangeRateApi {
    client: reqwest::Client,
    base_url: String,
}

impl ExchangeRateApi {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.exchangerate-api.com/v4/latest";

    pub fn new() -> Result<Self> {
        Self::with_base_url(Self::DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build rate provider HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[derive(serde::Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

#[async_trait]
impl RateProvider for ExchangeRateApi {
    async fn fetch_rates(&self, pivot: &CurrencyCode) -> Result<HashMap<CurrencyCode, Decimal>> {
        let url = format!("{}/{}", self.base_url, pivot);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("rate request failed: {url}"))?
            .error_for_status()
            .context("rate endpoint returned an error status")?;
        let body: RatesResponse = response
            .json()
            .await
            .context("rate response was not valid JSON")?;

        let rates = body
            .rates
            .into_iter()
            .filter_map(|(code, rate)| {
                Decimal::from_f64_retain(rate)
                    .filter(|r| *r > Decimal::ZERO)
                    .map(|r| (CurrencyCode::new(code), r))
            })
            .collect();
        Ok(rates)
    }
}

/// Exchange rates keyed by currency code against the pivot.
/// Invariant: `rates[pivot] == 1`.
#[derive(Debug, Clone)]
pub struct ExchangeRateTable {
    pub pivot: CurrencyCode,
    pub rates: HashMap<CurrencyCode, Decimal>,
    pub last_refreshed: DateTime<Utc>,
    /// `None` until the first successful provider refresh; the built-in
    /// fallback counts as always-stale so a refresh is attempted early.
    refreshed_at: Option<Instant>,
}

impl ExchangeRateTable {
    /// Hard-coded fallback covering the pivot and the currencies of the
    /// built-in marketplace registry (plus common display currencies).
    pub fn fallback(pivot: CurrencyCode) -> Self {
        let mut rates: HashMap<CurrencyCode, Decimal> = [
            ("EUR", dec!(1.0)),
            ("USD", dec!(1.09)),
            ("GBP", dec!(0.85)),
            ("JPY", dec!(158.0)),
            ("AUD", dec!(1.65)),
            ("CAD", dec!(1.46)),
            ("CHF", dec!(0.93)),
            ("CNY", dec!(7.82)),
            ("INR", dec!(90.5)),
            ("BRL", dec!(5.35)),
            ("MXN", dec!(18.5)),
            ("PLN", dec!(4.33)),
            ("SEK", dec!(11.3)),
            ("TRY", dec!(33.2)),
            ("AED", dec!(4.0)),
            ("SAR", dec!(4.1)),
            ("SGD", dec!(1.46)),
            ("EGP", dec!(33.6)),
        ]
        .into_iter()
        .map(|(code, rate)| (CurrencyCode::new(code), rate))
        .collect();
        rates.insert(pivot.clone(), Decimal::ONE);

        Self {
            pivot,
            rates,
            last_refreshed: Utc::now(),
            refreshed_at: None,
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        match self.refreshed_at {
            Some(at) => at.elapsed() >= ttl,
            None => true,
        }
    }

    fn rate_for(&self, code: &CurrencyCode) -> Decimal {
        match self.rates.get(code) {
            Some(rate) if *rate > Decimal::ZERO => *rate,
            _ => {
                // Unknown currency degrades to a 1:1 conversion rather
                // than failing the whole comparison.
                warn!(currency = %code, "no exchange rate known, assuming 1:1");
                Decimal::ONE
            }
        }
    }
}

/// Process-wide converter with a TTL-refreshed rate table.
pub struct CurrencyConverter {
    provider: Arc<dyn RateProvider>,
    table: RwLock<ExchangeRateTable>,
    ttl: Duration,
}

impl CurrencyConverter {
    pub fn new(provider: Arc<dyn RateProvider>, pivot: CurrencyCode, ttl: Duration) -> Self {
        Self {
            provider,
            table: RwLock::new(ExchangeRateTable::fallback(pivot)),
            ttl,
        }
    }

    /// Production constructor wired to exchangerate-api.com with a EUR
    /// pivot.
    pub fn with_default_provider(ttl: Duration) -> Result<Self> {
        Ok(Self::new(
            Arc::new(ExchangeRateApi::new()?),
            CurrencyCode::new("EUR"),
            ttl,
        ))
    }

    /// Convert `amount` between two currencies via the pivot, rounded
    /// to two decimal places. Identity conversions return the amount
    /// unchanged, without rounding.
    pub async fn convert(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Decimal {
        if from == to {
            return amount;
        }
        self.refresh_if_stale().await;
        let table = self.table.read().await;
        let in_pivot = amount / table.rate_for(from);
        (in_pivot * table.rate_for(to)).round_dp(2)
    }

    /// Ratio between two currencies: `get_rate(a, b) * get_rate(b, a)`
    /// is ~1 and `get_rate(a, a)` is exactly 1.
    pub async fn get_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Decimal {
        if from == to {
            return Decimal::ONE;
        }
        self.refresh_if_stale().await;
        let table = self.table.read().await;
        table.rate_for(to) / table.rate_for(from)
    }

    /// Snapshot of the current table (for display / diagnostics).
    pub async fn table(&self) -> ExchangeRateTable {
        self.table.read().await.clone()
    }

    async fn refresh_if_stale(&self) {
        {
            let table = self.table.read().await;
            if !table.is_stale(self.ttl) {
                return;
            }
        }
        let mut table = self.table.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if !table.is_stale(self.ttl) {
            return;
        }
        let pivot = table.pivot.clone();
        match self.provider.fetch_rates(&pivot).await {
            Ok(mut rates) => {
                rates.insert(pivot.clone(), Decimal::ONE);
                debug!(currencies = rates.len(), pivot = %pivot, "exchange rates refreshed");
                *table = ExchangeRateTable {
                    pivot,
                    rates,
                    last_refreshed: Utc::now(),
                    refreshed_at: Some(Instant::now()),
                };
            }
            Err(err) => {
                // Keep serving the last good table; retry on the next
                // stale read rather than on a tight loop.
                warn!(error = %err, "exchange rate refresh failed, keeping previous table");
                table.refreshed_at = Some(Instant::now());
            }
        }
    }
}
