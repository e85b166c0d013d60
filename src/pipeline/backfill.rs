//! Historical sweep over a set of sources with an optional year window.
//! Resume comes for free through the manifest: already-fetched documents are
//! manifest hits and cost one lookup, not one download.

use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::BackfillSettings;
use crate::domain::Result;
use crate::ingestion::DiscoveredDoc;

use super::Pipeline;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillSummary {
    pub requested: usize,
    pub filtered: usize,
    pub queued_unique: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub sources: Vec<String>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
}

static TITLE_YEAR_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(20\d{2})\s*[/\u{2013}-]\s*(20\d{2})").unwrap());
static TITLE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(20\d{2})").unwrap());

/// First year mentioned in a title, range start preferred.
pub fn year_from_title(title: &str) -> Option<i32> {
    if let Some(caps) = TITLE_YEAR_RANGE.captures(title) {
        return caps[1].parse().ok();
    }
    TITLE_YEAR.captures(title).and_then(|caps| caps[1].parse().ok())
}

/// Keep documents inside the window; unknown years are kept so nothing
/// important is silently dropped.
pub fn filter_by_year(
    docs: Vec<DiscoveredDoc>,
    year_from: Option<i32>,
    year_to: Option<i32>,
) -> Vec<DiscoveredDoc> {
    if year_from.is_none() && year_to.is_none() {
        return docs;
    }

    docs.into_iter()
        .filter(|doc| {
            let year = doc
                .meta
                .year
                .as_deref()
                .and_then(year_from_title)
                .or_else(|| year_from_title(&doc.title));
            match year {
                None => true,
                Some(y) => {
                    year_from.map_or(true, |from| y >= from) && year_to.map_or(true, |to| y <= to)
                }
            }
        })
        .collect()
}

/// Run the backfill: discover each source, filter, dedupe by URL, then
/// process with bounded concurrency.
pub async fn run_backfill(
    pipeline: Arc<Pipeline>,
    settings: &BackfillSettings,
    downloads_dir: &Path,
) -> Result<BackfillSummary> {
    let mut all_docs: Vec<DiscoveredDoc> = Vec::new();
    for source_key in &settings.sources {
        match pipeline.discover_source(source_key).await {
            Ok(docs) => all_docs.extend(docs),
            Err(err) => warn!(source_key = %source_key, error = %err, "backfill discovery failed"),
        }
    }
    let requested = all_docs.len();

    let filtered = filter_by_year(all_docs, settings.year_from, settings.year_to);
    let filtered_count = filtered.len();

    let mut seen: HashSet<String> = HashSet::new();
    let queue: Vec<DiscoveredDoc> = filtered
        .into_iter()
        .filter(|doc| seen.insert(doc.url.clone()))
        .collect();
    let queued_unique = queue.len();

    info!(
        requested,
        filtered = filtered_count,
        queued = queued_unique,
        concurrency = settings.concurrency,
        "backfill queue ready"
    );

    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let tasks = queue.into_iter().map(|doc| {
        let pipeline = Arc::clone(&pipeline);
        let semaphore = Arc::clone(&semaphore);
        tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            pipeline.process_document(&doc).await.is_ok()
        })
    });

    let outcomes = join_all(tasks).await;
    let succeeded = outcomes
        .iter()
        .filter(|r| matches!(r, Ok(true)))
        .count();
    let failed = queued_unique - succeeded;

    let summary = BackfillSummary {
        requested,
        filtered: filtered_count,
        queued_unique,
        succeeded,
        failed,
        sources: settings.sources.clone(),
        year_from: settings.year_from,
        year_to: settings.year_to,
    };

    std::fs::create_dir_all(downloads_dir)?;
    std::fs::write(
        downloads_dir.join("backfill_summary.json"),
        serde_json::to_vec_pretty(&summary)?,
    )?;

    info!(succeeded, failed, "backfill complete");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DocumentType;
    use crate::ingestion::DocMeta;
    use chrono::Utc;

    fn doc(title: &str, year: Option<&str>) -> DiscoveredDoc {
        DiscoveredDoc {
            url: format!("https://t.go.ke/{}.pdf", title.replace(' ', "-")),
            title: title.to_string(),
            source: "Test".into(),
            source_key: "treasury".into(),
            doc_type: DocumentType::Budget,
            discovered_at: Utc::now(),
            meta: DocMeta {
                year: year.map(String::from),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_year_from_title() {
        assert_eq!(year_from_title("Budget Review 2021-2022"), Some(2021));
        assert_eq!(year_from_title("Circular 2019"), Some(2019));
        assert_eq!(year_from_title("No year"), None);
    }

    #[test]
    fn test_filter_keeps_window_and_unknown() {
        let docs = vec![
            doc("Budget 2018", None),
            doc("Budget 2020", None),
            doc("Budget 2022", None),
            doc("Budget 2024", None),
            doc("Undated budget", None),
            doc("Tagged doc", Some("2021")),
        ];

        let filtered = filter_by_year(docs, Some(2020), Some(2022));
        let titles: Vec<&str> = filtered.iter().map(|d| d.title.as_str()).collect();
        assert!(titles.contains(&"Budget 2020"));
        assert!(titles.contains(&"Budget 2022"));
        assert!(titles.contains(&"Undated budget"));
        assert!(titles.contains(&"Tagged doc"));
        assert!(!titles.contains(&"Budget 2018"));
        assert!(!titles.contains(&"Budget 2024"));
    }

    #[test]
    fn test_no_window_passthrough() {
        let docs = vec![doc("Budget 2018", None)];
        assert_eq!(filter_by_year(docs, None, None).len(), 1);
    }
}
