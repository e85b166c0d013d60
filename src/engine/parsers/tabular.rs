use crate::domain::ParsedRecord;
use crate::engine::extractor::Extraction;
use crate::engine::normalizer::Normalizer;

/// Budget and expenditure tables: row normalization is delegated to the
/// normalizer, which owns the column-role heuristics.
#[derive(Debug, Clone, Default)]
pub struct TabularParser {
    normalizer: Normalizer,
}

impl TabularParser {
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    pub fn parse(
        &self,
        extraction: &Extraction,
        source_key: &str,
        doc_type: &str,
    ) -> Vec<ParsedRecord> {
        self.normalizer
            .normalize_extracted_data(extraction, source_key, doc_type)
    }
}
