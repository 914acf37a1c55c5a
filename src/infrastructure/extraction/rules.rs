//! Declarative price extraction rules
//!
//! An ordered list of strategies, most trusted first. Each rule names
//! the CSS selectors it inspects; the extractor evaluates rules in
//! priority order and the first one producing a price wins. Keeping the
//! heuristics in one table keeps them auditable and testable in
//! isolation.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Selector;

/// How a rule chooses among multiple matching candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    /// First parseable candidate in document order.
    First,
    /// Lowest parseable candidate; used for deal blocks where several
    /// offer prices sit side by side.
    Lowest,
}

pub struct PriceRule {
    pub name: &'static str,
    pub selectors: Vec<Selector>,
    pub pick: Pick,
}

fn compile(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .map(|s| Selector::parse(s).expect("price rule selector is valid"))
        .collect()
}

/// The ranked rule list: buy-box price, then deal price, then generic
/// price indicators. Selector sets follow the storefronts' product
/// page markup.
pub static PRICE_RULES: Lazy<Vec<PriceRule>> = Lazy::new(|| {
    vec![
        PriceRule {
            name: "buy-box",
            selectors: compile(&[
                "#corePrice_feature_div .a-price .a-offscreen",
                ".apexPriceToPay .a-offscreen",
                "#price_inside_buybox",
                "#newBuyBoxPrice",
                "#priceblock_ourprice",
                ".a-price .a-offscreen",
            ]),
            pick: Pick::First,
        },
        PriceRule {
            name: "deal",
            selectors: compile(&[
                "#priceblock_dealprice",
                "#dealprice_block",
                ".dealPriceText",
                ".priceToPay .a-offscreen",
            ]),
            pick: Pick::Lowest,
        },
        PriceRule {
            name: "generic",
            selectors: compile(&[".a-color-price", "span[data-a-color='price']", "#sns-base-price"]),
            pick: Pick::First,
        },
    ]
});

/// Split whole/fraction price markup, tried after the selector rules.
pub static PRICE_WHOLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".a-price-whole").expect("valid selector"));
pub static PRICE_FRACTION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".a-price-fraction").expect("valid selector"));

/// Last-resort regexes over the raw body, for pages whose price only
/// appears in embedded JSON or data attributes.
pub static BODY_PRICE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#""price"\s*:\s*"?(\d+[.,]\d{2})"?"#,
        r#""priceAmount"\s*:\s*"?(\d+[.,]\d{2})"?"#,
        r#"data-price="(\d+[.,]\d{2})""#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("body price pattern is valid"))
    .collect()
});

/// Blocks inspected for explicit unavailability wording.
pub static AVAILABILITY_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    compile(&[
        "#availability",
        "#availability-string",
        "#outOfStock",
        ".availabilityMessage",
        "#availability .a-color-price",
        "#availability .a-color-error",
    ])
});

/// Delivery blocks inspected for shipping cost or free-shipping wording.
pub static SHIPPING_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    compile(&[
        "#deliveryMessageMirId",
        "#mir-layout-DELIVERY_BLOCK",
        "#delivery-message",
        "#amazonGlobal_feature_div",
        ".delivery-message",
        "#shipping-message",
        "#delivery-promise-text",
        "#price-shipping-message",
    ])
});

/// Title selectors, most specific first.
pub static TITLE_SELECTORS: Lazy<Vec<Selector>> =
    Lazy::new(|| compile(&["#productTitle", "#title", ".product-title"]));
