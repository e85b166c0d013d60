pub mod extractor;
pub mod normalizer;
pub mod parsers;

pub use extractor::{ExtractedTable, Extraction, ExtractionPage, Extractor};
pub use normalizer::Normalizer;
pub use parsers::{AuditParser, StatisticsParser, TabularParser};
