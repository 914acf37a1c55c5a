//! Listing and document entities
//!
//! A `Listing` holds the normalized price facts extracted for one
//! product on one marketplace. Listings are immutable once created and
//! replaced wholesale on refresh.

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::error::CompareError;
use crate::domain::marketplace::{CurrencyCode, MarketplaceId};

static PRODUCT_ID_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{10}$").expect("product id regex is valid"));

/// Ten-character alphanumeric product token shared across storefronts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Validates the ASIN shape; rejects anything else up front so the
    /// engine never builds URLs from garbage input.
    pub fn new(raw: impl Into<String>) -> Result<Self, CompareError> {
        let raw = raw.into().trim().to_uppercase();
        if PRODUCT_ID_SHAPE.is_match(&raw) {
            Ok(Self(raw))
        } else {
            Err(CompareError::InvalidProductId(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A raw product page retrieved from one marketplace, input to the
/// listing extractor.
#[derive(Debug, Clone)]
pub struct Document {
    pub marketplace_id: MarketplaceId,
    pub product_id: ProductId,
    pub url: String,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

/// Extracted price facts for one product on one marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub product_id: ProductId,
    pub marketplace_id: MarketplaceId,
    pub price: Decimal,
    /// `None` means the page showed no shipping indicator at all;
    /// explicit free shipping is `Some(0)`.
    pub shipping_cost: Option<Decimal>,
    pub currency: CurrencyCode,
    pub available: bool,
    pub title: Option<String>,
    pub source_url: String,
    pub observed_at: DateTime<Utc>,
}
