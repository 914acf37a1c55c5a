//! Error taxonomy for the aggregation engine
//!
//! Per-marketplace failures (`FetchError`, `ExtractionError`) are
//! contained at the marketplace boundary and recovered by exclusion;
//! only `CompareError` ever reaches the caller of `compare`.

use thiserror::Error;

use crate::domain::marketplace::MarketplaceId;

/// Caller-visible structural errors. Everything else degrades to an
/// excluded marketplace, never a failed comparison.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompareError {
    #[error("unknown marketplace id: {0}")]
    UnknownMarketplace(MarketplaceId),

    #[error("invalid product id: {0:?}")]
    InvalidProductId(String),
}

/// Outcome of a document fetch that did not produce a body.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    /// No response within the request timeout.
    #[error("request timed out")]
    Timeout,

    /// The product is legitimately absent on this storefront (404).
    /// Never retried.
    #[error("product not listed on this marketplace")]
    NotFound,

    /// Non-success HTTP status after retries were exhausted or for a
    /// status class that is not worth retrying.
    #[error("http status {status}")]
    Http { status: u16 },

    /// Transport-level failure (DNS, connect, TLS, ...) after retries.
    #[error("network error: {message}")]
    Network { message: String },
}

impl FetchError {
    /// Transient failures are retried up to the configured bound;
    /// `NotFound` and 4xx statuses are final on the first attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Network { .. } => true,
            FetchError::NotFound => false,
            FetchError::Http { status } => *status == 429 || *status >= 500,
        }
    }
}

/// Extraction failed to produce a listing. An expected, non-exceptional
/// outcome for marketplaces where the product page has no usable offer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no price pattern matched")]
    NoPriceFound,

    #[error("document is not a parseable product page")]
    MalformedDocument,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_never_retryable() {
        assert!(!FetchError::NotFound.is_retryable());
    }

    #[test]
    fn server_errors_and_rate_limits_are_retryable() {
        assert!(FetchError::Http { status: 500 }.is_retryable());
        assert!(FetchError::Http { status: 503 }.is_retryable());
        assert!(FetchError::Http { status: 429 }.is_retryable());
        assert!(!FetchError::Http { status: 403 }.is_retryable());
    }

    #[test]
    fn timeouts_and_network_failures_are_retryable() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::Network { message: "dns".into() }.is_retryable());
    }
}
