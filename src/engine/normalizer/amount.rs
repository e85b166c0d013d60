use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::config::RateTable;
use crate::domain::{money::BASE_CURRENCY, NormalizedAmount};

struct CurrencyPatterns {
    currency: &'static str,
    patterns: Vec<Regex>,
}

static CURRENCIES: Lazy<Vec<CurrencyPatterns>> = Lazy::new(|| {
    vec![
        CurrencyPatterns {
            currency: "KES",
            patterns: vec![
                Regex::new(r"(?i)KES\s*([\d.]+)").unwrap(),
                Regex::new(r"(?i)K\.?Shs?\.?\s*([\d.]+)").unwrap(),
                Regex::new(r"(?i)([\d.]+)\s*KES").unwrap(),
                Regex::new(r"(?i)([\d.]+)\s*K\.?Shs?").unwrap(),
            ],
        },
        CurrencyPatterns {
            currency: "USD",
            patterns: vec![
                Regex::new(r"(?i)USD\s*([\d.]+)").unwrap(),
                Regex::new(r"(?i)US\$\s*([\d.]+)").unwrap(),
                Regex::new(r"\$\s*([\d.]+)").unwrap(),
            ],
        },
    ]
});

static BARE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"([\d.]+)").unwrap());

/// Magnitude suffix directly attached to a number, e.g. `2.5B` or `3.1 bn`.
static SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(tn|t|bn|b|mn|m|k)\b").unwrap());

pub(super) fn normalize(raw: &str, context: &str, rates: &RateTable) -> Option<NormalizedAmount> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }

    for currency in CURRENCIES.iter() {
        for pattern in &currency.patterns {
            if let Some(caps) = pattern.captures(&cleaned) {
                let group = caps.get(1)?;
                if let Ok(mut amount) = Decimal::from_str(group.as_str()) {
                    amount *= magnitude(&cleaned, group.end(), context);
                    let rate = rates.rate_to_kes(currency.currency)?;
                    return Some(
                        NormalizedAmount::new(amount, currency.currency, rate)
                            .with_confidence(0.8)
                            .with_raw(raw.trim()),
                    );
                }
            }
        }
    }

    // Bare numeric string: default to KES at low confidence.
    if let Some(caps) = BARE_NUMBER.captures(&cleaned) {
        let group = caps.get(1)?;
        if let Ok(mut amount) = Decimal::from_str(group.as_str()) {
            amount *= magnitude(&cleaned, group.end(), context);
            return Some(
                NormalizedAmount::new(amount, BASE_CURRENCY, Decimal::ONE)
                    .with_confidence(0.3)
                    .with_raw(raw.trim()),
            );
        }
    }

    None
}

/// Scale factor from a suffix right after the number, magnitude words in the
/// string, or the caller's context hint.
fn magnitude(cleaned: &str, number_end: usize, context: &str) -> Decimal {
    if let Some(caps) = SUFFIX.captures(&cleaned[number_end..]) {
        return match caps[1].to_lowercase().as_str() {
            "t" | "tn" => Decimal::from(1_000_000_000_000_i64),
            "b" | "bn" => Decimal::from(1_000_000_000_i64),
            "m" | "mn" => Decimal::from(1_000_000_i64),
            _ => Decimal::from(1_000_i64),
        };
    }

    let lower = cleaned.to_lowercase();
    if lower.contains("trillion") {
        return Decimal::from(1_000_000_000_000_i64);
    }
    if lower.contains("billion") {
        return Decimal::from(1_000_000_000_i64);
    }
    if lower.contains("million") {
        return Decimal::from(1_000_000_i64);
    }
    if lower.contains("thousand") {
        return Decimal::from(1_000_i64);
    }

    match context_hint(context) {
        Some(m) => m,
        None => Decimal::ONE,
    }
}

fn context_hint(context: &str) -> Option<Decimal> {
    let lower = context.to_lowercase();
    let has_token = |token: &str| {
        lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|t| t == token)
    };

    if has_token("trillion") || has_token("tn") || has_token("t") {
        Some(Decimal::from(1_000_000_000_000_i64))
    } else if has_token("billion") || has_token("bn") || has_token("b") {
        Some(Decimal::from(1_000_000_000_i64))
    } else if has_token("million") || has_token("mn") || has_token("m") {
        Some(Decimal::from(1_000_000_i64))
    } else if has_token("thousand") || has_token("k") {
        Some(Decimal::from(1_000_i64))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rates() -> RateTable {
        RateTable::default()
    }

    #[test]
    fn test_kes_with_commas() {
        let amount = normalize("KES 1,500,000", "", &rates()).unwrap();
        assert_eq!(amount.amount, dec!(1500000));
        assert_eq!(amount.currency, "KES");
        assert_eq!(amount.base_amount, dec!(1500000));
        assert_eq!(amount.confidence, 0.8);
    }

    #[test]
    fn test_billion_suffix_letter() {
        let amount = normalize("KES 2.5B", "", &rates()).unwrap();
        assert_eq!(amount.base_amount, dec!(2500000000.00));
    }

    #[test]
    fn test_ksh_billion_word() {
        let amount = normalize("Ksh 2.5 billion", "", &rates()).unwrap();
        assert_eq!(amount.base_amount, dec!(2500000000.00));
    }

    #[test]
    fn test_usd_million_converts_to_base() {
        let amount = normalize("$100 million", "", &rates()).unwrap();
        assert_eq!(amount.currency, "USD");
        assert_eq!(amount.amount, dec!(100000000));
        assert_eq!(amount.base_amount, dec!(100000000) * dec!(129));
        assert_eq!(amount.base_currency, "KES");
    }

    #[test]
    fn test_bare_number_falls_back_to_kes() {
        let amount = normalize("123456.78", "", &rates()).unwrap();
        assert_eq!(amount.currency, "KES");
        assert_eq!(amount.confidence, 0.3);
    }

    #[test]
    fn test_context_hint_scales() {
        let amount = normalize("450", "KES million", &rates()).unwrap();
        assert_eq!(amount.amount, dec!(450000000));
    }

    #[test]
    fn test_garbage_yields_none() {
        assert!(normalize("no digits at all", "", &rates()).is_none());
        assert!(normalize("", "", &rates()).is_none());
    }
}
