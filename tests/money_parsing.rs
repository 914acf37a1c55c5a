//! Property tests for locale-tolerant money parsing.

use proptest::prelude::*;
use rust_decimal::Decimal;

use price_scout::infrastructure::extraction::numeric::parse_money;

fn expected(units: u64, cents: u64) -> Decimal {
    Decimal::new((units * 100 + cents) as i64, 2)
}

proptest! {
    #[test]
    fn comma_decimal_amounts_parse(units in 1u64..1_000_000, cents in 0u64..100) {
        let text = format!("{units},{cents:02} €");
        prop_assert_eq!(parse_money(&text), Some(expected(units, cents)));
    }

    #[test]
    fn dot_decimal_amounts_parse(units in 1u64..1_000_000, cents in 0u64..100) {
        let text = format!("${units}.{cents:02}");
        prop_assert_eq!(parse_money(&text), Some(expected(units, cents)));
    }

    #[test]
    fn dot_grouped_comma_decimal_amounts_parse(
        thousands in 1u64..1_000,
        rest in 0u64..1_000,
        cents in 0u64..100,
    ) {
        let text = format!("{thousands}.{rest:03},{cents:02} zł");
        prop_assert_eq!(
            parse_money(&text),
            Some(expected(thousands * 1_000 + rest, cents))
        );
    }

    #[test]
    fn comma_grouped_dot_decimal_amounts_parse(
        thousands in 1u64..1_000,
        rest in 0u64..1_000,
        cents in 0u64..100,
    ) {
        let text = format!("£{thousands},{rest:03}.{cents:02}");
        prop_assert_eq!(
            parse_money(&text),
            Some(expected(thousands * 1_000 + rest, cents))
        );
    }

    #[test]
    fn surrounding_prose_does_not_change_the_amount(units in 1u64..10_000, cents in 0u64..100) {
        let bare = format!("{units},{cents:02}");
        let wrapped = format!("Prix : {units},{cents:02} € TTC");
        prop_assert_eq!(parse_money(&wrapped), parse_money(&bare));
    }
}

#[test]
fn zero_and_garbage_are_rejected() {
    assert_eq!(parse_money("0,00 €"), None);
    assert_eq!(parse_money("out of stock"), None);
    assert_eq!(parse_money(""), None);
}
