//! Comparison request options and ranked result
//!
//! `ComparisonResult` is only built through [`ComparisonResult::ranked`]
//! which enforces the ordering invariants: alternatives sorted ascending
//! by comparison total (ties broken by marketplace id), `best_price`
//! equal to the first alternative, `savings` present only when both an
//! origin listing and a best price exist.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::listing::{Listing, ProductId};
use crate::domain::marketplace::{CurrencyCode, MarketplaceId};

/// Caller-supplied knobs for a single comparison run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareOptions {
    /// Add known shipping costs to the comparison total.
    pub include_shipping: bool,
    /// Restrict candidates to this subset of registered marketplaces.
    /// `None` means every registered marketplace except the origin.
    pub enabled_marketplaces: Option<HashSet<MarketplaceId>>,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            include_shipping: true,
            enabled_marketplaces: None,
        }
    }
}

/// A listing together with its comparison total in the requester's
/// currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedAlternative {
    pub listing: Listing,
    /// Price (plus known shipping, when configured) converted into the
    /// requester's currency. This is the ranking key.
    pub converted_total: Decimal,
}

/// Ranked cross-marketplace comparison for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub product_id: ProductId,
    pub origin_marketplace: MarketplaceId,
    pub requester_currency: CurrencyCode,
    pub include_shipping: bool,
    /// The origin marketplace's own listing, converted; absent when the
    /// origin page could not be resolved.
    pub origin: Option<RankedAlternative>,
    /// Sorted ascending by `converted_total`, ties broken by
    /// marketplace id.
    pub alternatives: Vec<RankedAlternative>,
    /// First alternative, or absent iff `alternatives` is empty.
    pub best_price: Option<RankedAlternative>,
    /// Origin total minus best total; may be negative when the origin
    /// is already the cheapest. Absent without an origin listing or
    /// without alternatives.
    pub savings: Option<Decimal>,
    pub generated_at: DateTime<Utc>,
}

impl ComparisonResult {
    /// Sorts, ranks and derives `best_price` / `savings`.
    pub fn ranked(
        product_id: ProductId,
        origin_marketplace: MarketplaceId,
        requester_currency: CurrencyCode,
        include_shipping: bool,
        origin: Option<RankedAlternative>,
        mut alternatives: Vec<RankedAlternative>,
    ) -> Self {
        alternatives.sort_by(|a, b| {
            a.converted_total
                .cmp(&b.converted_total)
                .then_with(|| a.listing.marketplace_id.cmp(&b.listing.marketplace_id))
        });
        let best_price = alternatives.first().cloned();
        let savings = match (&origin, &best_price) {
            (Some(o), Some(b)) => Some(o.converted_total - b.converted_total),
            _ => None,
        };
        Self {
            product_id,
            origin_marketplace,
            requester_currency,
            include_shipping,
            origin,
            alternatives,
            best_price,
            savings,
            generated_at: Utc::now(),
        }
    }

    /// A comparison with zero alternatives is a normal, reportable
    /// state, distinct from an error.
    pub fn has_alternatives(&self) -> bool {
        !self.alternatives.is_empty()
    }

    /// Relative saving as a percentage of the origin total, rounded to
    /// one decimal place. Used against the configured price-drop
    /// notification threshold. Absent whenever `savings` is, or when
    /// the origin total is not positive.
    pub fn savings_percent(&self) -> Option<Decimal> {
        let origin_total = self.origin.as_ref()?.converted_total;
        let savings = self.savings?;
        if origin_total <= Decimal::ZERO {
            return None;
        }
        Some((savings / origin_total * Decimal::ONE_HUNDRED).round_dp(1))
    }
}
