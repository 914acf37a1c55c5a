//! Locale phrase tables for condition, availability and shipping cues
//!
//! Matching is lowercase substring containment. The tables cover every
//! locale in the built-in marketplace registry; missing a phrase here
//! degrades gracefully (a used offer slips through or shipping stays
//! unknown), it never breaks extraction.

/// Text spans that mark a used / refurbished / renewed offer. Price
/// candidates sitting next to one of these are skipped; only the
/// new-condition offer is wanted.
pub const USED_CONDITION_PHRASES: &[&str] = &[
    // en
    "used", "refurbished", "renewed", "pre-owned",
    // fr
    "d'occasion", "occasion", "reconditionné",
    // de
    "gebraucht", "generalüberholt",
    // it
    "usato", "ricondizionato",
    // es
    "segunda mano", "reacondicionado",
    // nl
    "tweedehands", "gereviseerd",
    // pl
    "używany", "odnowiony",
    // sv
    "begagnad", "renoverad",
];

/// Explicit out-of-stock wording. Absence of any of these defaults the
/// listing to available.
pub const UNAVAILABLE_PHRASES: &[&str] = &[
    // en
    "currently unavailable",
    "temporarily out of stock",
    "out of stock",
    "no longer available",
    "not available",
    "unavailable",
    // fr
    "actuellement indisponible",
    "indisponible",
    // de
    "derzeit nicht verfügbar",
    "nicht verfügbar",
    "nicht auf lager",
    // it
    "non disponibile",
    "attualmente non disponibile",
    // es
    "no disponible",
    "agotado",
    // nl
    "niet beschikbaar",
    "niet op voorraad",
    // pl
    "niedostępny",
    "obecnie niedostępny",
    // sv
    "slut i lager",
    "ej i lager",
];

/// Free-shipping wording; maps shipping cost to an explicit zero.
pub const FREE_SHIPPING_PHRASES: &[&str] = &[
    // en
    "free delivery",
    "free shipping",
    "free",
    // fr
    "livraison gratuite",
    "gratuit",
    // de
    "kostenlose lieferung",
    "versandkostenfrei",
    "kostenlos",
    // it / es / nl
    "consegna gratuita",
    "envío gratis",
    "gratis",
    // pl
    "darmowa dostawa",
    // sv
    "fri frakt",
];

/// Case-insensitive containment over a phrase table.
pub fn contains_any(text: &str, phrases: &[&str]) -> bool {
    let haystack = text.to_lowercase();
    phrases.iter().any(|phrase| haystack.contains(phrase))
}
