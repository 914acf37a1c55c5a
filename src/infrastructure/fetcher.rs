//! Document fetching with rate limiting, bounded concurrency and retry
//!
//! `DocumentFetcher` turns a (marketplace, product id) pair into a raw
//! product page. The actual transport sits behind the
//! [`DocumentRetriever`] trait so the engine can run against an
//! in-process stub in tests; [`HttpRetriever`] is the reqwest-backed
//! production implementation.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::domain::{Document, FetchError, Marketplace, ProductId};

/// Fetcher tuning knobs. Defaults mirror a polite interactive client:
/// short per-request timeout, a small retry budget and a worker pool of
/// three concurrent requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub user_agent: String,
    /// Hard bound on a single attempt, in milliseconds.
    pub request_timeout_ms: u64,
    /// Additional attempts after the first, for transient failures only.
    pub max_retries: u32,
    /// First backoff delay; grows by 1.5x per attempt with +-25% jitter.
    pub retry_base_delay_ms: u64,
    /// Concurrency pool size across all in-flight marketplace lookups.
    pub max_concurrent: usize,
    /// Requests per second across the whole process.
    pub max_requests_per_second: u32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
            request_timeout_ms: 5_000,
            max_retries: 3,
            retry_base_delay_ms: 1_000,
            max_concurrent: 3,
            max_requests_per_second: 7,
        }
    }
}

/// Transport capability: retrieve a raw body for a URL.
///
/// Implementations report not-found, timeout and transport failures as
/// distinct `FetchError` values; retry policy lives one layer up in
/// [`DocumentFetcher`].
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    async fn retrieve(&self, url: &str, headers: &[(&str, String)]) -> Result<String, FetchError>;
}

/// reqwest-backed retriever with gzip and a bounded redirect policy.
pub struct HttpRetriever {
    client: reqwest::Client,
}

impl HttpRetriever {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("invalid user agent")?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("text/html"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentRetriever for HttpRetriever {
    async fn retrieve(&self, url: &str, headers: &[(&str, String)]) -> Result<String, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Network {
                    message: e.to_string(),
                }
            }
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(FetchError::NotFound),
            status if !status.is_success() => Err(FetchError::Http {
                status: status.as_u16(),
            }),
            _ => response.text().await.map_err(|e| FetchError::Network {
                message: e.to_string(),
            }),
        }
    }
}

/// Retrieves product pages under a request timeout, a bounded retry
/// policy and a fixed-size concurrency pool.
pub struct DocumentFetcher {
    retriever: Arc<dyn DocumentRetriever>,
    pool: Arc<Semaphore>,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: FetcherConfig,
}

impl DocumentFetcher {
    pub fn new(retriever: Arc<dyn DocumentRetriever>, config: FetcherConfig) -> Result<Self> {
        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("max_requests_per_second must be greater than 0")?,
        );
        Ok(Self {
            retriever,
            pool: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            rate_limiter: RateLimiter::direct(quota),
            config,
        })
    }

    /// Production constructor wiring the reqwest transport.
    pub fn with_http(config: FetcherConfig) -> Result<Self> {
        let retriever = Arc::new(HttpRetriever::new(&config)?);
        Self::new(retriever, config)
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Fetch the product page for `product_id` on `marketplace`.
    ///
    /// Every outcome is an explicit value: a `Document` on success, or
    /// a `FetchError` describing not-found, timeout or final transport
    /// failure. Transient failures are retried up to `max_retries`
    /// extra attempts as a bounded loop, never recursion.
    pub async fn fetch(
        &self,
        marketplace: &Marketplace,
        product_id: &ProductId,
    ) -> Result<Document, FetchError> {
        let _permit = self
            .pool
            .acquire()
            .await
            .map_err(|_| FetchError::Network {
                message: "fetch pool closed".to_string(),
            })?;

        let url = marketplace.product_url(product_id);
        let headers = [(
            "Accept-Language",
            format!("{},en;q=0.8", marketplace.locale),
        )];

        let mut last_error = FetchError::Network {
            message: "no attempt made".to_string(),
        };
        // Each attempt is bounded here as well, so transports that do
        // not police their own deadline still produce `Timeout`.
        let attempt_timeout = Duration::from_millis(self.config.request_timeout_ms);

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.backoff_delay(attempt, &last_error);
                debug!(
                    marketplace = %marketplace.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying fetch after backoff"
                );
                tokio::time::sleep(delay).await;
            }

            self.rate_limiter.until_ready().await;

            let outcome =
                match tokio::time::timeout(attempt_timeout, self.retriever.retrieve(&url, &headers))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(FetchError::Timeout),
                };

            match outcome {
                Ok(body) => {
                    debug!(marketplace = %marketplace.id, url = %url, bytes = body.len(), "fetched product page");
                    return Ok(Document {
                        marketplace_id: marketplace.id.clone(),
                        product_id: product_id.clone(),
                        url,
                        body,
                        fetched_at: Utc::now(),
                    });
                }
                Err(FetchError::NotFound) => {
                    // Legitimately absent; a negative result, not a failure.
                    debug!(marketplace = %marketplace.id, "product not listed (404)");
                    return Err(FetchError::NotFound);
                }
                Err(err) if err.is_retryable() => {
                    warn!(
                        marketplace = %marketplace.id,
                        attempt = attempt + 1,
                        max_attempts = self.config.max_retries + 1,
                        error = %err,
                        "fetch attempt failed"
                    );
                    last_error = err;
                }
                Err(err) => {
                    warn!(marketplace = %marketplace.id, error = %err, "fetch failed, not retryable");
                    return Err(err);
                }
            }
        }

        warn!(marketplace = %marketplace.id, error = %last_error, "fetch gave up after retries");
        Err(last_error)
    }

    /// Exponential backoff with jitter; rate-limit responses get an
    /// extra penalty delay on top.
    fn backoff_delay(&self, attempt: u32, last_error: &FetchError) -> Duration {
        let base = self.config.retry_base_delay_ms as f64;
        let exponential = base * 1.5_f64.powi(attempt.saturating_sub(1) as i32);
        let jitter = 0.75 + fastrand::f64() * 0.5;
        let mut millis = exponential * jitter;
        if matches!(last_error, FetchError::Http { status: 429 | 503 }) {
            millis += base * 2.0 * attempt as f64;
        }
        Duration::from_millis(millis as u64)
    }
}
