//! Pipeline orchestration: discover → fetch → extract → parse → load for a
//! single source per invocation, with manifest-based dedup, polite pacing
//! and per-run summaries. Per-document failures are recorded and the run
//! continues; only the loader's errors propagate this far.

pub mod backfill;
pub mod monitor;
pub mod reports;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{
    DocumentRecord, DocumentType, FiscalOpsError, IngestionJob, ParsedRecord, Result,
};
use crate::engine::extractor::Extractor;
use crate::engine::normalizer::Normalizer;
use crate::engine::parsers::{AuditParser, StatisticsParser, TabularParser};
use crate::ingestion::discovery::{self, DiscoveredDoc};
use crate::ingestion::{Fetcher, ManifestEntry, ManifestStore, Mirror, SourceRegistry};
use crate::notify::{Alert, AlertSeverity, Notifier};
use crate::storage::{Database, Loader};

use reports::RunSummary;

/// How many candidates a run takes from the top of the discovery list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDepth {
    Light,
    Deep,
}

impl RunDepth {
    pub fn batch_size(&self) -> usize {
        match self {
            RunDepth::Light => 5,
            RunDepth::Deep => 40,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub document_id: i64,
    pub file_path: String,
    pub skipped: bool,
    pub records_created: u64,
    pub records_updated: u64,
}

pub struct Pipeline {
    registry: SourceRegistry,
    fetcher: Fetcher,
    manifest: Arc<dyn ManifestStore>,
    mirror: Mirror,
    extractor: Extractor,
    tabular_parser: TabularParser,
    audit_parser: AuditParser,
    statistics_parser: StatisticsParser,
    loader: Loader,
    notifier: Option<Arc<dyn Notifier>>,
    downloads_dir: PathBuf,
    reports_dir: PathBuf,
    document_delay: Duration,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        database: &Database,
        registry: SourceRegistry,
        manifest: Arc<dyn ManifestStore>,
        mirror: Mirror,
    ) -> Result<Self> {
        let normalizer = Normalizer::new(config.rates.clone());
        let fetcher = Fetcher::new(&config.http, &config.storage.downloads_dir)?;

        Ok(Self {
            registry,
            fetcher,
            manifest,
            mirror,
            extractor: Extractor::new(),
            tabular_parser: TabularParser::new(normalizer.clone()),
            audit_parser: AuditParser::new(normalizer.clone()),
            statistics_parser: StatisticsParser::new(normalizer),
            loader: Loader::new(database.pool().clone()),
            notifier: None,
            downloads_dir: config.storage.downloads_dir.clone(),
            reports_dir: config.storage.reports_dir.clone(),
            document_delay: Duration::from_millis(config.http.document_delay_ms),
        })
    }

    /// Attach the notifier used for loader-fatal alerts.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub async fn discover_source(&self, source_key: &str) -> Result<Vec<DiscoveredDoc>> {
        let source = self
            .registry
            .get(source_key)
            .ok_or_else(|| FiscalOpsError::UnknownSource(source_key.to_string()))?;
        Ok(discovery::discover(&self.fetcher, source).await)
    }

    /// One light or deep pass over a single source.
    pub async fn run_source(&self, source_key: &str, depth: RunDepth) -> Result<RunSummary> {
        if self.registry.is_empty() {
            warn!("source registry is empty; check the sources file");
        }

        let mut summary = RunSummary::new(source_key, "etl");
        let discovered = self.discover_source(source_key).await?;
        summary.discovered = discovered.len();
        info!(source_key, discovered = discovered.len(), "discovery complete");

        if let Err(err) =
            reports::write_discovered_tsv(&self.reports_dir, source_key, "etl", &discovered)
        {
            warn!(error = %err, "failed to write discovery report");
        }
        self.update_change_detection(source_key, &discovered).await;

        let batch = self.select_batch(source_key, discovered, depth);
        let mut job = IngestionJob::start(source_key);

        for (index, doc) in batch.iter().enumerate() {
            match self.process_document(doc).await {
                Ok(processed) => {
                    summary.processed += 1;
                    if processed.skipped {
                        summary.skipped += 1;
                    } else {
                        summary.successful += 1;
                    }
                    job.records_processed += 1;
                    job.records_created += processed.records_created;
                    job.records_updated += processed.records_updated;
                }
                Err(err) => {
                    summary.processed += 1;
                    summary.record_failure(&doc.url, &err.to_string());
                    job.record_error(format!("{}: {err}", doc.url));
                    self.alert_loader_fatal(source_key, &doc.url, &err).await;
                }
            }

            // Courtesy pause between same-source documents.
            if index + 1 < batch.len() && !self.document_delay.is_zero() {
                tokio::time::sleep(self.document_delay).await;
            }
        }

        summary.finish();
        job.finish(true);
        if let Err(err) = self.loader.record_job(&job).await {
            warn!(error = %err, "failed to record ingestion job");
        }
        if let Err(err) = reports::write_summary_json(&self.reports_dir, source_key, "etl", &summary)
        {
            warn!(error = %err, "failed to write run summary");
        }
        if let Err(err) = reports::write_pipeline_results(&self.downloads_dir, &summary) {
            warn!(error = %err, "failed to write pipeline results");
        }

        info!(
            source_key,
            processed = summary.processed,
            successful = summary.successful,
            skipped = summary.skipped,
            failed = summary.failed,
            "run complete"
        );
        Ok(summary)
    }

    /// Fetch, extract, parse and load one candidate. Manifest hits
    /// short-circuit without re-processing.
    pub async fn process_document(&self, doc: &DiscoveredDoc) -> Result<ProcessedDocument> {
        let url = self.resolve_document_url(doc).await;

        // Pre-HTTP short-circuit on a known URL.
        if let Some((_, entry)) = self.manifest.find_by_url(&url) {
            info!(url = %url, document_id = entry.document_id, "manifest hit, skipping");
            return Ok(ProcessedDocument {
                document_id: entry.document_id,
                file_path: entry.file_path,
                skipped: true,
                records_created: 0,
                records_updated: 0,
            });
        }

        let download = self
            .fetcher
            .download(&url, &doc.source_key)
            .await
            .ok_or_else(|| FiscalOpsError::fetch(format!("download failed for {url}")))?;

        // Same content under a different URL.
        if let Some(entry) = self.manifest.get(&download.md5) {
            info!(url = %url, md5 = %download.md5, "content already processed, skipping");
            return Ok(ProcessedDocument {
                document_id: entry.document_id,
                file_path: entry.file_path,
                skipped: true,
                records_created: 0,
                records_updated: 0,
            });
        }

        let mirror_key = self
            .mirror
            .mirror_file(
                &download.file_path,
                &download.md5,
                &doc.source_key,
                download.content_type.as_deref(),
            )
            .await;

        let extraction = self.extractor.extract_with_fallback(&download.file_path);
        let records = self.parse_records(doc, &extraction);
        if extraction.confidence == 0.0 || records.is_empty() {
            // The document row is still persisted for provenance.
            info!(url = %url, confidence = extraction.confidence, "no records parsed");
        }

        let metadata = serde_json::json!({
            "file_size": download.bytes,
            "source_key": doc.source_key,
            "extraction_confidence": extraction.confidence,
            "breadcrumbs": doc.meta.breadcrumbs,
            "year": doc.meta.year,
            "level": doc.meta.level,
            "mirror_key": mirror_key,
        });
        let document = DocumentRecord {
            title: doc.title.clone(),
            url: url.clone(),
            file_path: download.file_path.display().to_string(),
            publisher: doc.source.clone(),
            source_key: doc.source_key.clone(),
            doc_type: doc.doc_type,
            fetch_date: Utc::now(),
            md5: Some(download.md5.clone()),
            metadata,
        };

        let outcome = self.loader.load_document(&document, &records).await?;
        self.loader
            .record_extraction(outcome.document_id, &extraction)
            .await?;

        self.manifest.insert(
            &download.md5,
            ManifestEntry {
                document_id: outcome.document_id,
                file_path: document.file_path.clone(),
                url: url.clone(),
                title: doc.title.clone(),
                source: doc.source.clone(),
                doc_type: doc.doc_type.as_str().to_string(),
                fetched: document.fetch_date.to_rfc3339(),
                mirror_key,
            },
        )?;

        Ok(ProcessedDocument {
            document_id: outcome.document_id,
            file_path: document.file_path,
            skipped: false,
            records_created: outcome.created,
            records_updated: outcome.updated,
        })
    }

    /// Loader fatals page someone; fetch/extract failures stay in the run
    /// summary.
    async fn alert_loader_fatal(&self, source_key: &str, url: &str, err: &FiscalOpsError) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if matches!(err, FiscalOpsError::Database(_) | FiscalOpsError::Migration(_)) {
            let alert = Alert::new(
                format!("Loader failure during {source_key} run"),
                format!("{url}: {err}"),
                AlertSeverity::Critical,
            );
            let _ = notifier.send(&alert, None).await;
        }
    }

    /// A candidate without a file extension is usually a landing page; use
    /// the first file link found on it.
    async fn resolve_document_url(&self, doc: &DiscoveredDoc) -> String {
        if discovery::is_file_url(&doc.url) {
            return doc.url.clone();
        }
        let Some(source) = self.registry.get(&doc.source_key) else {
            return doc.url.clone();
        };
        let Some(body) = self.fetcher.fetch_html(&doc.url, &doc.source_key).await else {
            return doc.url.clone();
        };
        first_file_link(&body, &source.base_url).unwrap_or_else(|| doc.url.clone())
    }

    fn parse_records(&self, doc: &DiscoveredDoc, extraction: &crate::engine::extractor::Extraction) -> Vec<ParsedRecord> {
        if doc.doc_type == DocumentType::Audit {
            self.audit_parser.parse(extraction, &doc.title)
        } else if doc.source_key == "knbs" || doc.meta.stats_kind.is_some() {
            self.statistics_parser.parse(extraction, &doc.title)
        } else {
            self.tabular_parser
                .parse(extraction, &doc.source_key, doc.doc_type.as_str())
        }
    }

    /// Light runs take the head of the list; deep treasury runs pick a
    /// curated batch of the latest reviews, borrowing plans and circulars.
    pub fn select_batch(
        &self,
        source_key: &str,
        docs: Vec<DiscoveredDoc>,
        depth: RunDepth,
    ) -> Vec<DiscoveredDoc> {
        if source_key == "treasury" && depth == RunDepth::Deep {
            return select_treasury_batch(docs);
        }
        let mut docs = docs;
        docs.truncate(depth.batch_size());
        docs
    }

    /// Known-URL list plus landing-page hashes for the seeds; both feed the
    /// cheap "anything new?" check between runs.
    async fn update_change_detection(&self, source_key: &str, docs: &[DiscoveredDoc]) {
        let mut known = reports::load_known_urls(&self.reports_dir, source_key);
        for doc in docs {
            known.insert(doc.url.clone());
        }
        if let Err(err) = reports::save_known_urls(&self.reports_dir, source_key, &known) {
            warn!(error = %err, "failed to save known urls");
        }

        let Some(source) = self.registry.get(source_key) else {
            return;
        };
        let mut hashes: BTreeMap<String, String> =
            reports::load_known_hashes(&self.reports_dir, source_key);
        for seed in &source.seeds {
            if let Some(hash) = self.fetcher.fetch_page_hash(seed, source_key).await {
                hashes.insert(seed.clone(), hash);
            }
        }
        if let Err(err) = reports::save_known_hashes(&self.reports_dir, source_key, &hashes) {
            warn!(error = %err, "failed to save known hashes");
        }
    }
}

fn first_file_link(body: &str, base_url: &str) -> Option<String> {
    let host = discovery::host_key(base_url)?;
    discovery::page_links(body)
        .into_iter()
        .filter(|link| discovery::is_http_link(&link.href))
        .filter_map(|link| discovery::resolve_url(&link.href, base_url))
        .find(|resolved| discovery::same_host(resolved, &host) && discovery::is_file_url(resolved))
}

static YEAR_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(20\d{2})\s*[/\u{2013}-]\s*(20\d{2})").unwrap());
static YEAR_SINGLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(20\d{2})").unwrap());
static QEBR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)qebr|quarterly\s+economic").unwrap());
static ABP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)annual\s+borrowing\s+plan|\babp\b").unwrap());
static CIRCULAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)circular").unwrap());

/// Latest 10 quarterly reviews + 3 borrowing plans + 5 circulars, ordered by
/// fiscal year and quarter inferred from titles.
fn select_treasury_batch(docs: Vec<DiscoveredDoc>) -> Vec<DiscoveredDoc> {
    fn year_key(title: &str) -> i64 {
        if let Some(caps) = YEAR_RANGE.captures(title) {
            let first: i64 = caps[1].parse().unwrap_or(0);
            let second: i64 = caps[2].parse().unwrap_or(0);
            return first * 100 + second % 100;
        }
        YEAR_SINGLE
            .captures(title)
            .and_then(|caps| caps[1].parse().ok())
            .unwrap_or(0)
    }

    fn quarter_rank(title: &str) -> i64 {
        let t = title.to_lowercase();
        if t.contains("q4") || t.contains("4th quarter") {
            4
        } else if t.contains("q3") || t.contains("3rd quarter") {
            3
        } else if t.contains("q2")
            || t.contains("2nd quarter")
            || t.contains("first half")
            || t.contains("half year")
        {
            2
        } else if t.contains("q1") || t.contains("1st quarter") {
            1
        } else {
            0
        }
    }

    let mut qebr: Vec<&DiscoveredDoc> =
        docs.iter().filter(|d| QEBR.is_match(&d.title)).collect();
    let mut abp: Vec<&DiscoveredDoc> = docs.iter().filter(|d| ABP.is_match(&d.title)).collect();
    let mut circulars: Vec<&DiscoveredDoc> =
        docs.iter().filter(|d| CIRCULAR.is_match(&d.title)).collect();

    qebr.sort_by_key(|d| std::cmp::Reverse((year_key(&d.title), quarter_rank(&d.title))));
    abp.sort_by_key(|d| std::cmp::Reverse(year_key(&d.title)));
    circulars.sort_by_key(|d| std::cmp::Reverse(year_key(&d.title)));

    qebr.into_iter()
        .take(10)
        .chain(abp.into_iter().take(3))
        .chain(circulars.into_iter().take(5))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::DocMeta;

    fn doc(title: &str) -> DiscoveredDoc {
        DiscoveredDoc {
            url: format!("https://t.go.ke/{}.pdf", title.replace(' ', "-")),
            title: title.to_string(),
            source: "National Treasury Kenya".into(),
            source_key: "treasury".into(),
            doc_type: DocumentType::Report,
            discovered_at: Utc::now(),
            meta: DocMeta::default(),
        }
    }

    #[test]
    fn test_treasury_batch_selection() {
        let docs = vec![
            doc("QEBR 2022-2023 Q1"),
            doc("QEBR 2023-2024 Q4"),
            doc("QEBR 2023-2024 Q2"),
            doc("Annual Borrowing Plan 2021-2022"),
            doc("Annual Borrowing Plan 2023-2024"),
            doc("Treasury Circular 5 of 2024"),
            doc("Random Gazette"),
        ];

        let batch = select_treasury_batch(docs);
        // Newest QEBR first; the gazette is not selected.
        assert_eq!(batch[0].title, "QEBR 2023-2024 Q4");
        assert!(batch.iter().all(|d| d.title != "Random Gazette"));
        assert!(batch.iter().any(|d| d.title.contains("Circular")));
    }

    #[test]
    fn test_first_file_link() {
        let html = r#"<a href="/about/">About</a><a href="/files/report.pdf">Report</a>"#;
        assert_eq!(
            first_file_link(html, "https://cob.go.ke").unwrap(),
            "https://cob.go.ke/files/report.pdf"
        );
        assert!(first_file_link("<p>nothing</p>", "https://cob.go.ke").is_none());
    }
}
