//! Marketplace registry
//!
//! Static mapping of storefront domain to currency, locale and region.
//! Loaded once at startup; lookups never hit the network.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::CompareError;

/// Identifier of a regional storefront, e.g. `amazon.fr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketplaceId(String);

impl MarketplaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketplaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MarketplaceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// ISO 4217 currency code, normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A regional storefront with its own currency and locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marketplace {
    pub id: MarketplaceId,
    /// Human-readable country name, e.g. "France".
    pub name: String,
    pub currency: CurrencyCode,
    /// BCP 47 locale sent as Accept-Language when fetching this storefront.
    pub locale: String,
    pub region: String,
}

impl Marketplace {
    fn new(id: &str, name: &str, currency: &str, locale: &str, region: &str) -> Self {
        Self {
            id: MarketplaceId::new(id),
            name: name.to_string(),
            currency: CurrencyCode::new(currency),
            locale: locale.to_string(),
            region: region.to_string(),
        }
    }

    /// Product page URL on this storefront.
    pub fn product_url(&self, product_id: &crate::domain::ProductId) -> String {
        format!("https://{}/dp/{}", self.id, product_id)
    }
}

/// Read-only lookup of configured marketplaces.
///
/// Absence of a key is a configuration error reported to the caller,
/// never retried.
#[derive(Debug, Clone)]
pub struct MarketplaceRegistry {
    marketplaces: BTreeMap<MarketplaceId, Marketplace>,
}

impl MarketplaceRegistry {
    /// The built-in set of European storefronts.
    pub fn builtin() -> Self {
        Self::from_marketplaces(vec![
            Marketplace::new("amazon.com.be", "Belgium", "EUR", "fr-BE", "Europe"),
            Marketplace::new("amazon.fr", "France", "EUR", "fr-FR", "Europe"),
            Marketplace::new("amazon.de", "Germany", "EUR", "de-DE", "Europe"),
            Marketplace::new("amazon.it", "Italy", "EUR", "it-IT", "Europe"),
            Marketplace::new("amazon.nl", "Netherlands", "EUR", "nl-NL", "Europe"),
            Marketplace::new("amazon.pl", "Poland", "PLN", "pl-PL", "Europe"),
            Marketplace::new("amazon.es", "Spain", "EUR", "es-ES", "Europe"),
            Marketplace::new("amazon.se", "Sweden", "SEK", "sv-SE", "Europe"),
            Marketplace::new("amazon.co.uk", "UK", "GBP", "en-GB", "Europe"),
        ])
    }

    /// Build a registry from an explicit marketplace set (used by tests
    /// and custom deployments).
    pub fn from_marketplaces(marketplaces: Vec<Marketplace>) -> Self {
        Self {
            marketplaces: marketplaces
                .into_iter()
                .map(|m| (m.id.clone(), m))
                .collect(),
        }
    }

    pub fn get(&self, id: &MarketplaceId) -> Result<&Marketplace, CompareError> {
        self.marketplaces
            .get(id)
            .ok_or_else(|| CompareError::UnknownMarketplace(id.clone()))
    }

    /// All registered marketplaces, in deterministic id order.
    pub fn all(&self) -> impl Iterator<Item = &Marketplace> {
        self.marketplaces.values()
    }

    pub fn len(&self) -> usize {
        self.marketplaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marketplaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_nine_storefronts() {
        let registry = MarketplaceRegistry::builtin();
        assert_eq!(registry.len(), 9);
    }

    #[test]
    fn lookup_is_case_insensitive_on_construction() {
        let registry = MarketplaceRegistry::builtin();
        let fr = registry.get(&MarketplaceId::new("AMAZON.FR")).unwrap();
        assert_eq!(fr.currency, CurrencyCode::new("EUR"));
        assert_eq!(fr.locale, "fr-FR");
    }

    #[test]
    fn unknown_marketplace_is_a_configuration_error() {
        let registry = MarketplaceRegistry::builtin();
        let err = registry.get(&MarketplaceId::new("amazon.example")).unwrap_err();
        assert!(matches!(err, CompareError::UnknownMarketplace(_)));
    }

    #[test]
    fn non_euro_storefronts_carry_their_currency() {
        let registry = MarketplaceRegistry::builtin();
        assert_eq!(
            registry.get(&"amazon.pl".into()).unwrap().currency,
            "PLN".into()
        );
        assert_eq!(
            registry.get(&"amazon.se".into()).unwrap().currency,
            "SEK".into()
        );
        assert_eq!(
            registry.get(&"amazon.co.uk".into()).unwrap().currency,
            "GBP".into()
        );
    }
}
