//! Per-source crawl strategies. Every strategy yields candidate documents
//! with breadcrumbs and an inferred year, enqueues same-host links only, and
//! finishes by deduplicating on URL (first hit wins).

mod cob;
mod generic;
mod knbs;
mod oag;
mod treasury;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

use crate::domain::DocumentType;

use super::fetcher::Fetcher;
use super::sources::SourceConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocMeta {
    #[serde(default)]
    pub breadcrumbs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    /// OAG section the document was found under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Statistics publication family, for the statistics parser dispatch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats_kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredDoc {
    pub url: String,
    pub title: String,
    pub source: String,
    pub source_key: String,
    pub doc_type: DocumentType,
    pub discovered_at: DateTime<Utc>,
    #[serde(default)]
    pub meta: DocMeta,
}

/// Run the strategy registered for this source.
pub async fn discover(fetcher: &Fetcher, source: &SourceConfig) -> Vec<DiscoveredDoc> {
    match source.key.as_str() {
        "treasury" => treasury::discover(fetcher, source).await,
        "cob" => cob::discover(fetcher, source).await,
        "oag" => oag::discover(fetcher, source).await,
        "knbs" => knbs::discover(fetcher, source).await,
        _ => generic::discover(fetcher, source).await,
    }
}

// ---------------------------------------------------------------------------
// Shared crawl helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) struct PageLink {
    pub href: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub(crate) struct QueueItem {
    pub url: String,
    pub breadcrumbs: Vec<String>,
    pub level: Option<String>,
}

static FILE_EXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(pdf|xlsx?|csv|docx?|zip)($|\?)").unwrap());

static PDF_EXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.pdf($|\?)").unwrap());

static FY_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)fy\s*([0-9]{4}\s*[-/\u{2013}]\s*[0-9]{4})").unwrap());

static BARE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(20[0-9]{2})").unwrap());

static YEAR_IN_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"20\d{2}").unwrap());

/// Tenders, vacancies and press noise that must never become documents.
const EXCLUDE_TERMS: [&str; 13] = [
    "tender",
    "advert",
    "vacancy",
    "recruitment",
    "eoi",
    "rfq",
    "rfp",
    "press release",
    "media release",
    "speech",
    "obituary",
    "appointment",
    "career",
];

/// Extract all anchors from an HTML body. Parsing is confined to this
/// synchronous helper so no DOM handle lives across an await point.
pub(crate) fn page_links(body: &str) -> Vec<PageLink> {
    static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

    let document = Html::parse_document(body);
    document
        .select(&ANCHOR)
        .filter_map(|a| {
            let href = a.value().attr("href")?.trim().to_string();
            let text = a.text().collect::<String>().trim().to_string();
            Some(PageLink { href, text })
        })
        .collect()
}

pub(crate) fn resolve_url(href: &str, base: &str) -> Option<String> {
    Url::parse(base).ok()?.join(href).ok().map(|u| u.to_string())
}

/// Host key with the `www.` prefix stripped; discovery is same-host only.
pub(crate) fn host_key(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|h| h.trim_start_matches("www.").to_string())
}

pub(crate) fn same_host(url: &str, host: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed
                    .host_str()
                    .map(|h| h.trim_start_matches("www.") == host)
                    .unwrap_or(false)
        }
        Err(_) => false,
    }
}

pub(crate) fn is_http_link(href: &str) -> bool {
    let h = href.trim().to_lowercase();
    !h.is_empty() && !h.starts_with('#') && !["mailto:", "tel:", "javascript:"]
        .iter()
        .any(|p| h.starts_with(p))
}

pub(crate) fn is_file_url(url: &str) -> bool {
    FILE_EXT.is_match(url)
}

pub(crate) fn is_pdf_url(url: &str) -> bool {
    PDF_EXT.is_match(url)
}

/// The "download" heuristic: file extension or an anchor that just says
/// Download.
pub(crate) fn is_file_link(url: &str, text: &str) -> bool {
    is_file_url(url) || text.trim().eq_ignore_ascii_case("download")
}

pub(crate) fn is_excluded(title: &str, url: &str) -> bool {
    let t = title.to_lowercase();
    let u = url.to_lowercase();
    EXCLUDE_TERMS.iter().any(|term| t.contains(term) || u.contains(term))
}

/// `FY2023/2024` style ranges first, then a bare year.
pub(crate) fn extract_year(text: &str) -> Option<String> {
    if let Some(caps) = FY_RANGE.captures(text) {
        return Some(caps[1].replace(' ', ""));
    }
    BARE_YEAR.captures(text).map(|caps| caps[1].to_string())
}

pub(crate) fn path_has_year(url: &str) -> bool {
    Url::parse(url)
        .map(|u| YEAR_IN_PATH.is_match(u.path()))
        .unwrap_or(false)
}

pub(crate) fn url_basename(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|s| s.filter(|p| !p.is_empty()).last().map(String::from))
        })
        .unwrap_or_else(|| url.to_string())
}

pub(crate) fn title_or_basename(text: &str, url: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() > 2 && !trimmed.eq_ignore_ascii_case("download") {
        trimmed.to_string()
    } else {
        url_basename(url).replace('-', " ")
    }
}

/// Append a breadcrumb, skipping consecutive repeats and keeping the last 6.
pub(crate) fn push_crumb(crumbs: &[String], label: &str) -> Vec<String> {
    let label = label.trim();
    let mut next = crumbs.to_vec();
    if !label.is_empty()
        && label.len() > 2
        && crumbs
            .last()
            .map(|l| !l.eq_ignore_ascii_case(label))
            .unwrap_or(true)
    {
        next.push(label.to_string());
    }
    let overflow = next.len().saturating_sub(6);
    next.drain(..overflow);
    next
}

/// Dedupe by URL; the first discovery of a URL keeps its title and metadata.
pub(crate) fn dedupe(docs: Vec<DiscoveredDoc>) -> Vec<DiscoveredDoc> {
    let mut seen: HashMap<String, ()> = HashMap::new();
    let mut unique = Vec::new();
    for doc in docs {
        if seen.insert(doc.url.clone(), ()).is_none() {
            unique.push(doc);
        }
    }
    unique
}

pub(crate) fn paginated(seed: &str, from: u32, to: u32) -> Vec<String> {
    (from..to)
        .map(|i| format!("{}/page/{}/", seed.trim_end_matches('/'), i))
        .collect()
}
