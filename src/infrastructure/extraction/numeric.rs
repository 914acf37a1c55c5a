//! Price text parsing
//!
//! Storefronts format numerals with either decimal-comma or
//! decimal-point conventions, with optional thousands separators
//! ("1.234,56", "1,234.56", "1234,56", "1 234.56"). The separator that
//! appears closest to the end of the numeral is taken as the decimal
//! separator; every other separator is treated as grouping.

use rust_decimal::Decimal;

/// Parse a money amount out of arbitrary price text.
///
/// Returns `None` when no digits are present or the remaining numeral
/// does not parse. Zero and negative amounts are rejected; a price of
/// zero on a product page is always an extraction artifact.
pub fn parse_money(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');

    let normalized = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) => {
            // Both separators present: the later one is the decimal mark.
            let (decimal_sep, group_sep) = if dot > comma { ('.', ',') } else { (',', '.') };
            let without_groups: String = cleaned.chars().filter(|c| *c != group_sep).collect();
            without_groups.replace(decimal_sep, ".")
        }
        (None, Some(_)) => {
            if cleaned.matches(',').count() > 1 {
                // "1,234,567" - grouping only.
                cleaned.replace(',', "")
            } else {
                cleaned.replace(',', ".")
            }
        }
        (Some(_), None) => {
            if cleaned.matches('.').count() > 1 {
                // "1.234.567" - grouping only.
                cleaned.replace('.', "")
            } else {
                cleaned
            }
        }
        (None, None) => cleaned,
    };

    let amount: Decimal = normalized.parse().ok()?;
    if amount <= Decimal::ZERO {
        return None;
    }
    Some(amount)
}
