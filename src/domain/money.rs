use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Base currency every monetary amount is projected into.
pub const BASE_CURRENCY: &str = "KES";

/// A monetary amount with its native currency and the base-currency
/// projection. Both values keep two fractional digits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedAmount {
    pub amount: Decimal,
    pub currency: String,
    pub base_amount: Decimal,
    pub base_currency: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_amount: Option<String>,
}

impl NormalizedAmount {
    pub fn new(amount: Decimal, currency: impl Into<String>, rate_to_base: Decimal) -> Self {
        let amount = amount.round_dp(2);
        Self {
            amount,
            currency: currency.into(),
            base_amount: (amount * rate_to_base).round_dp(2),
            base_currency: BASE_CURRENCY.to_string(),
            confidence: 1.0,
            raw_amount: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw_amount = Some(raw.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_base_projection_applies_rate() {
        let amount = NormalizedAmount::new(dec!(100), "USD", dec!(129));
        assert_eq!(amount.base_amount, dec!(12900.00));
        assert_eq!(amount.base_currency, "KES");
    }

    #[test]
    fn test_kes_is_identity() {
        let amount = NormalizedAmount::new(dec!(2500000000), "KES", dec!(1));
        assert_eq!(amount.amount, amount.base_amount);
    }
}
