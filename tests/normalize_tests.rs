use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

use fiscal_ops::config::RateTable;
use fiscal_ops::Normalizer;

fn normalizer() -> Normalizer {
    Normalizer::new(RateTable::default())
}

#[test]
fn fiscal_period_parse_and_round_trip() {
    let normalizer = normalizer();

    let period = normalizer.normalize_fiscal_period("FY 2024/25").unwrap();
    assert_eq!(period.label, "FY2024/25");
    assert_eq!(period.start_date.to_string(), "2024-07-01");
    assert_eq!(period.end_date.to_string(), "2025-06-30");

    // Re-parsing the canonical label reproduces the same period.
    let again = normalizer.normalize_fiscal_period(&period.label).unwrap();
    assert_eq!(again.label, period.label);
    assert_eq!(again.start_date, period.start_date);
    assert_eq!(again.end_date, period.end_date);
}

#[test]
fn amount_base_currency_law() {
    let normalizer = normalizer();

    let kes = normalizer.normalize_amount("KES 2.5B", "").unwrap();
    assert_eq!(kes.base_amount, dec!(2500000000.00));
    assert_eq!(kes.base_currency, "KES");

    let usd = normalizer.normalize_amount("$100 million", "").unwrap();
    assert_eq!(usd.currency, "USD");
    assert_eq!(usd.base_amount, dec!(100000000) * dec!(129));
    assert_eq!(usd.base_currency, "KES");

    // base_amount = amount * rate within rounding tolerance.
    let projected = usd.amount * dec!(129);
    assert!((usd.base_amount - projected).abs() <= dec!(0.01));
}

#[test]
fn amount_rate_table_is_configuration() {
    let mut rates = RateTable::default();
    rates.to_kes.insert("USD".to_string(), dec!(100));
    let normalizer = Normalizer::new(rates);

    let usd = normalizer.normalize_amount("USD 5", "").unwrap();
    assert_eq!(usd.base_amount, dec!(500.00));
}

#[test]
fn entity_fuzzy_matching_threshold() {
    let normalizer = normalizer();

    let exact = normalizer.normalize_entity_name("nairobi").unwrap();
    assert_eq!(exact.confidence, 1.0);
    assert_eq!(exact.canonical_name, "Nairobi County");

    let fuzzy = normalizer.normalize_entity_name("Nairobi Count").unwrap();
    assert!(fuzzy.confidence >= 0.70);
    assert_eq!(fuzzy.canonical_name, "Nairobi County");

    assert_matches!(
        normalizer.normalize_entity_name("totally different organization"),
        None
    );
}

#[test]
fn slug_is_stable_across_calls() {
    let normalizer = normalizer();
    let a = normalizer.normalize_entity_name("Mombasa").unwrap().slug();
    let b = normalizer.normalize_entity_name("mombasa").unwrap().slug();
    assert_eq!(a, b);
    assert_eq!(a, "mombasa-county");
}
