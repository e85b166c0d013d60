//! Run artifacts: discovery TSVs, run summaries, and the known-URL/hash
//! files used for cheap change detection between runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::domain::Result;
use crate::ingestion::DiscoveredDoc;

/// Failures kept in a summary; the rest are counted only.
pub const MAX_REPORTED_FAILURES: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFailure {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub source_key: String,
    pub job: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub discovered: usize,
    pub processed: usize,
    pub successful: usize,
    pub skipped: usize,
    pub failures: Vec<RunFailure>,
    /// Total failure count; `failures` holds at most the first 50.
    pub failed: usize,
}

impl RunSummary {
    pub fn new(source_key: &str, job: &str) -> Self {
        Self {
            source_key: source_key.to_string(),
            job: job.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            discovered: 0,
            processed: 0,
            successful: 0,
            skipped: 0,
            failures: Vec::new(),
            failed: 0,
        }
    }

    pub fn record_failure(&mut self, url: &str, error: &str) {
        self.failed += 1;
        if self.failures.len() < MAX_REPORTED_FAILURES {
            self.failures.push(RunFailure {
                url: url.to_string(),
                error: error.to_string(),
            });
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

fn dated_dir(reports_dir: &Path) -> PathBuf {
    reports_dir.join(Utc::now().format("%Y-%m-%d").to_string())
}

fn known_dir(reports_dir: &Path) -> PathBuf {
    reports_dir.join("known")
}

/// `{source}_{job}_discovered.tsv`: title and url, tab-separated, header row.
pub fn write_discovered_tsv(
    reports_dir: &Path,
    source_key: &str,
    job: &str,
    docs: &[DiscoveredDoc],
) -> Result<PathBuf> {
    let dir = dated_dir(reports_dir);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{source_key}_{job}_discovered.tsv"));

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(&path)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    writer
        .write_record(["title", "url"])
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    for doc in docs {
        writer
            .write_record([doc.title.as_str(), doc.url.as_str()])
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    }
    writer
        .flush()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    Ok(path)
}

pub fn write_summary_json(
    reports_dir: &Path,
    source_key: &str,
    job: &str,
    summary: &RunSummary,
) -> Result<PathBuf> {
    let dir = dated_dir(reports_dir);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{source_key}_{job}_summary.json"));
    std::fs::write(&path, serde_json::to_vec_pretty(summary)?)?;
    Ok(path)
}

/// Per-run results file next to the downloads, one per invocation.
pub fn write_pipeline_results(downloads_dir: &Path, summary: &RunSummary) -> Result<PathBuf> {
    std::fs::create_dir_all(downloads_dir)?;
    let path = downloads_dir.join(format!(
        "pipeline_results_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    std::fs::write(&path, serde_json::to_vec_pretty(summary)?)?;
    Ok(path)
}

pub fn load_known_urls(reports_dir: &Path, source_key: &str) -> HashSet<String> {
    let path = known_dir(reports_dir).join(format!("known_{source_key}.txt"));
    match std::fs::read_to_string(path) {
        Ok(contents) => contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect(),
        Err(_) => HashSet::new(),
    }
}

pub fn save_known_urls(
    reports_dir: &Path,
    source_key: &str,
    urls: &HashSet<String>,
) -> Result<()> {
    let dir = known_dir(reports_dir);
    std::fs::create_dir_all(&dir)?;
    let mut sorted: Vec<&String> = urls.iter().collect();
    sorted.sort();
    let contents = sorted
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");
    std::fs::write(dir.join(format!("known_{source_key}.txt")), contents + "\n")?;
    Ok(())
}

pub fn load_known_hashes(reports_dir: &Path, source_key: &str) -> BTreeMap<String, String> {
    let path = known_dir(reports_dir).join(format!("known_{source_key}_hashes.json"));
    std::fs::read_to_string(path)
        .ok()
        .and_then(|contents| serde_json::from_str(&contents).ok())
        .unwrap_or_default()
}

pub fn save_known_hashes(
    reports_dir: &Path,
    source_key: &str,
    hashes: &BTreeMap<String, String>,
) -> Result<()> {
    let dir = known_dir(reports_dir);
    std::fs::create_dir_all(&dir)?;
    std::fs::write(
        dir.join(format!("known_{source_key}_hashes.json")),
        serde_json::to_vec_pretty(hashes)?,
    )?;
    Ok(())
}
