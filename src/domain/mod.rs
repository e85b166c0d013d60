pub mod document;
pub mod entity;
pub mod error;
pub mod job;
pub mod money;
pub mod period;
pub mod record;

pub use document::{DebtCategory, DocumentRecord, DocumentStatus, DocumentType, Severity};
pub use entity::{Country, EntityInfo, EntityType};
pub use error::{FiscalOpsError, Result};
pub use job::{IngestionJob, JobStatus};
pub use money::NormalizedAmount;
pub use period::NormalizedPeriod;
pub use record::{ParsedRecord, Provenance};
