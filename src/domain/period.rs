use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Canonical fiscal period. Kenya's fiscal year runs July 1 through June 30
/// and is labelled `FY{YYYY}/{YY}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPeriod {
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_period: Option<String>,
}

impl NormalizedPeriod {
    /// Build the period for the fiscal year starting in `start_year`.
    pub fn fiscal_year(start_year: i32) -> Self {
        let end_year = start_year + 1;
        Self {
            label: format!("FY{}/{:02}", start_year, end_year % 100),
            start_date: NaiveDate::from_ymd_opt(start_year, 7, 1).expect("valid fiscal start"),
            end_date: NaiveDate::from_ymd_opt(end_year, 6, 30).expect("valid fiscal end"),
            confidence: 1.0,
            raw_period: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw_period = Some(raw.into());
        self
    }
}
