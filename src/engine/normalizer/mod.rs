//! Canonicalization of entity names, fiscal periods and monetary amounts.
//!
//! Everything here is a pure function of its inputs plus the configured
//! currency rate table; no I/O.

mod amount;
mod entity;
mod period;
mod tabular;

pub use entity::{county_names, KnownEntity, KNOWN_ENTITIES};

use crate::config::RateTable;
use crate::domain::{EntityInfo, NormalizedAmount, NormalizedPeriod, ParsedRecord};
use crate::engine::extractor::Extraction;

#[derive(Debug, Clone)]
pub struct Normalizer {
    rates: RateTable,
}

impl Normalizer {
    pub fn new(rates: RateTable) -> Self {
        Self { rates }
    }

    /// Map a raw entity string to a canonical public body. Exact lowercase
    /// match first, then fuzzy token matching with a 0.70 acceptance floor.
    pub fn normalize_entity_name(&self, raw: &str) -> Option<EntityInfo> {
        entity::normalize(raw)
    }

    /// Recognize `FY YYYY/YY`, `YYYY/YY FY` and `Financial Year YYYY/YY`;
    /// a bare four-digit year infers the fiscal year at half confidence.
    pub fn normalize_fiscal_period(&self, raw: &str) -> Option<NormalizedPeriod> {
        period::normalize(raw)
    }

    /// Extract an amount with currency detection, magnitude scaling and the
    /// base-KES projection.
    pub fn normalize_amount(&self, raw: &str, context: &str) -> Option<NormalizedAmount> {
        amount::normalize(raw, context, &self.rates)
    }

    /// Turn extracted tables into candidate budget-line records.
    pub fn normalize_extracted_data(
        &self,
        extraction: &Extraction,
        source_key: &str,
        doc_type: &str,
    ) -> Vec<ParsedRecord> {
        tabular::normalize_tables(self, extraction, source_key, doc_type)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(RateTable::default())
    }
}
