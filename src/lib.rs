//! fiscal-ops - data acquisition platform for Kenya public-finance
//! transparency.
//!
//! The crate continuously discovers, downloads, parses, normalizes and
//! stores public-finance documents (budgets, audit reports, debt bulletins,
//! economic statistics) from the authoritative Kenyan publishers, and keeps
//! the normalized records queryable for the read-side API.

pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod ingestion;
pub mod notify;
pub mod observability;
pub mod pipeline;
pub mod scheduler;
pub mod secrets;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use domain::{
    DocumentRecord, DocumentStatus, DocumentType, EntityInfo, EntityType, FiscalOpsError,
    IngestionJob, JobStatus, NormalizedAmount, NormalizedPeriod, ParsedRecord, Provenance, Result,
    Severity,
};

pub use engine::{AuditParser, Extraction, Extractor, Normalizer, StatisticsParser, TabularParser};

pub use ingestion::{
    BlobStore, DiscoveredDoc, Download, Fetcher, FsBlobStore, InMemoryManifestStore,
    JsonManifestStore, ManifestEntry, ManifestStore, Mirror, SourceConfig, SourceRegistry,
};

pub use notify::{Alert, AlertChannel, AlertManager, AlertSeverity, MemoryNotifier, Notifier};

pub use pipeline::{
    backfill::{run_backfill, BackfillSummary},
    monitor::{RunMetrics, RunMonitor},
    reports::{RunFailure, RunSummary},
    Pipeline, ProcessedDocument, RunDepth,
};

pub use scheduler::{ScheduleReport, Scheduler, SourceSchedule};

pub use storage::{Database, LoadOutcome, Loader, Queries};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
