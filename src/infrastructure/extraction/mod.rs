//! Listing extraction from raw product pages
//!
//! Applies the ranked rule list from [`rules`] to a parsed document and
//! produces a normalized [`Listing`], or `ExtractionError::NoPriceFound`
//! when no strategy yields a price. That failure is an expected outcome
//! for storefronts where the product is unlisted, not an exception.

pub mod numeric;
pub mod phrases;
pub mod rules;

use chrono::Utc;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html};
use tracing::{debug, trace};

use crate::domain::{Document, ExtractionError, Listing, Marketplace};

use numeric::parse_money;
use phrases::{contains_any, FREE_SHIPPING_PHRASES, UNAVAILABLE_PHRASES, USED_CONDITION_PHRASES};
use rules::{
    Pick, AVAILABILITY_SELECTORS, BODY_PRICE_PATTERNS, PRICE_FRACTION_SELECTOR, PRICE_RULES,
    PRICE_WHOLE_SELECTOR, SHIPPING_SELECTORS, TITLE_SELECTORS,
};

/// Stateless extractor; safe to share across tasks.
#[derive(Debug, Default)]
pub struct ListingExtractor;

impl ListingExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract a listing from `document`, using `marketplace` for the
    /// currency tag.
    pub fn extract(
        &self,
        document: &Document,
        marketplace: &Marketplace,
    ) -> Result<Listing, ExtractionError> {
        if document.body.trim().is_empty() {
            return Err(ExtractionError::MalformedDocument);
        }
        let html = Html::parse_document(&document.body);

        let price = self
            .find_price(&html, &document.body)
            .ok_or(ExtractionError::NoPriceFound)?;

        let listing = Listing {
            product_id: document.product_id.clone(),
            marketplace_id: document.marketplace_id.clone(),
            price,
            shipping_cost: self.find_shipping_cost(&html),
            currency: marketplace.currency.clone(),
            available: self.is_available(&html),
            title: self.find_title(&html),
            source_url: document.url.clone(),
            observed_at: Utc::now(),
        };
        debug!(
            marketplace = %listing.marketplace_id,
            price = %listing.price,
            available = listing.available,
            shipping = ?listing.shipping_cost,
            "extracted listing"
        );
        Ok(listing)
    }

    /// Evaluate the ranked rule list; first rule with a usable price wins.
    fn find_price(&self, html: &Html, raw_body: &str) -> Option<Decimal> {
        for rule in PRICE_RULES.iter() {
            let mut candidates: Vec<Decimal> = Vec::new();
            for selector in &rule.selectors {
                for element in html.select(selector) {
                    if is_struck_through(&element) || is_used_offer(&element) {
                        trace!(rule = rule.name, "skipping struck-through or used-offer candidate");
                        continue;
                    }
                    if let Some(amount) = parse_money(&element_text(&element)) {
                        match rule.pick {
                            Pick::First => {
                                trace!(rule = rule.name, %amount, "price rule matched");
                                return Some(amount);
                            }
                            Pick::Lowest => candidates.push(amount),
                        }
                    }
                }
            }
            if let Some(lowest) = candidates.into_iter().min() {
                trace!(rule = rule.name, %lowest, "price rule matched (lowest candidate)");
                return Some(lowest);
            }
        }

        // Split whole/fraction markup, e.g. <span class="a-price-whole">29</span>
        // <span class="a-price-fraction">99</span>.
        if let Some(amount) = self.find_split_price(html) {
            return Some(amount);
        }

        // Raw-body fallback for prices living only in embedded JSON.
        for pattern in BODY_PRICE_PATTERNS.iter() {
            if let Some(captures) = pattern.captures(raw_body) {
                if let Some(amount) = captures.get(1).and_then(|m| parse_money(m.as_str())) {
                    trace!(pattern = pattern.as_str(), %amount, "body pattern matched");
                    return Some(amount);
                }
            }
        }
        None
    }

    fn find_split_price(&self, html: &Html) -> Option<Decimal> {
        let whole = html.select(&PRICE_WHOLE_SELECTOR).find(|element| {
            !is_struck_through(element) && !is_used_offer(element)
        })?;
        let whole_text = element_text(&whole);
        let fraction_text = whole
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(|parent| parent.select(&PRICE_FRACTION_SELECTOR).next())
            .map(|fraction| element_text(&fraction));

        // The whole part may carry its own grouping separator and a
        // trailing decimal mark ("1.299,"); keep digits only.
        let whole_digits: String = whole_text.chars().filter(char::is_ascii_digit).collect();
        let joined = match fraction_text {
            Some(fraction) => format!("{}.{}", whole_digits, fraction.trim()),
            None => whole_digits,
        };
        parse_money(&joined)
    }

    /// Availability defaults to true; only explicit unavailable wording
    /// in a recognized availability block flips it.
    fn is_available(&self, html: &Html) -> bool {
        for selector in AVAILABILITY_SELECTORS.iter() {
            for element in html.select(selector) {
                if contains_any(&element_text(&element), UNAVAILABLE_PHRASES) {
                    return false;
                }
            }
        }
        true
    }

    /// Free-shipping wording maps to zero; a numeric token in a
    /// delivery block is parsed; no delivery block at all leaves the
    /// cost unknown (`None`), which is distinct from free.
    fn find_shipping_cost(&self, html: &Html) -> Option<Decimal> {
        for selector in SHIPPING_SELECTORS.iter() {
            if let Some(element) = html.select(selector).next() {
                let text = element_text(&element);
                if contains_any(&text, FREE_SHIPPING_PHRASES) {
                    return Some(Decimal::ZERO);
                }
                if let Some(amount) = parse_money(&text) {
                    return Some(amount);
                }
            }
        }
        None
    }

    fn find_title(&self, html: &Html) -> Option<String> {
        for selector in TITLE_SELECTORS.iter() {
            if let Some(element) = html.select(selector).next() {
                let text = element_text(&element);
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
        None
    }
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Struck-through prices ("was" prices) must never win a rule.
fn is_struck_through(element: &ElementRef) -> bool {
    std::iter::once(*element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .any(|el| {
            let value = el.value();
            matches!(value.name(), "strike" | "del" | "s")
                || value.classes().any(|class| class == "a-text-price")
        })
}

/// A candidate is a used/refurbished offer when its enclosing block
/// carries condition wording in any supported locale. Two ancestor
/// levels cover the storefronts' offer-box nesting without scanning
/// whole-page containers.
fn is_used_offer(element: &ElementRef) -> bool {
    std::iter::once(*element)
        .chain(element.ancestors().filter_map(ElementRef::wrap).take(2))
        .any(|el| contains_any(&element_text(&el), USED_CONDITION_PHRASES))
}
