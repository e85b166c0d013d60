use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use tracing::debug;
use url::Url;

use crate::domain::DocumentType;
use crate::ingestion::fetcher::Fetcher;
use crate::ingestion::sources::SourceConfig;

use super::{
    dedupe, extract_year, host_key, is_file_url, is_http_link, is_pdf_url, page_links, paginated,
    push_crumb, resolve_url, same_host, title_or_basename, url_basename, DiscoveredDoc, DocMeta,
    QueueItem,
};

const MAX_PAGES: usize = 700;

/// Navigation chrome that must not become breadcrumbs or enqueue targets.
const GENERIC_NAV: [&str; 6] = [
    "home",
    "about us",
    "contact us",
    "media center",
    "publications",
    "tenders",
];

/// Card labels on the section landing pages that lead to report listings.
const CARD_TERMS: [&str; 14] = [
    "ministries",
    "departments",
    "agencies",
    "state corporations",
    "political parties",
    "schools",
    "county executives",
    "assemblies",
    "municipalities",
    "boards",
    "county funds",
    "hospitals",
    "water companies",
    "county revenue funds",
];

/// BFS across the four top-level report sections. Every emitted document
/// carries its section (`level`) and a trimmed breadcrumb trail for UI
/// grouping.
pub(super) async fn discover(fetcher: &Fetcher, source: &SourceConfig) -> Vec<DiscoveredDoc> {
    let Some(host) = host_key(&source.base_url) else {
        return Vec::new();
    };

    let mut queue: VecDeque<QueueItem> = VecDeque::new();
    for seed in &source.seeds {
        let level = level_for(seed);
        queue.push_back(QueueItem {
            url: seed.clone(),
            breadcrumbs: level.iter().map(|l| l.to_string()).collect(),
            level: level.map(String::from),
        });
        for url in paginated(seed, 2, 8) {
            queue.push_back(QueueItem {
                url,
                breadcrumbs: level.iter().map(|l| l.to_string()).collect(),
                level: level.map(String::from),
            });
        }
    }

    let mut seen_pages: HashSet<String> = HashSet::new();
    let mut collected = Vec::new();
    let mut pages = 0usize;

    while let Some(item) = queue.pop_front() {
        if pages >= MAX_PAGES || !seen_pages.insert(item.url.clone()) {
            continue;
        }
        let Some(body) = fetcher.fetch_html(&item.url, &source.key).await else {
            continue;
        };
        pages += 1;

        let links = page_links(&body);

        // Pass 1: PDFs on this page become documents.
        for link in &links {
            if !is_http_link(&link.href) || !is_pdf_url(&link.href) {
                continue;
            }
            let Some(resolved) = resolve_url(&link.href, &source.base_url) else {
                continue;
            };
            if !same_host(&resolved, &host) || noise_path(&resolved) {
                continue;
            }

            let title = title_or_basename(&link.text, &resolved);
            let doc_type = match DocumentType::classify_title(&title) {
                DocumentType::Other => DocumentType::Audit,
                other => other,
            };
            collected.push(DiscoveredDoc {
                url: resolved,
                title: title.clone(),
                source: source.name.clone(),
                source_key: source.key.clone(),
                doc_type,
                discovered_at: Utc::now(),
                meta: DocMeta {
                    breadcrumbs: item.breadcrumbs.clone(),
                    year: extract_year(&title),
                    level: item.level.clone(),
                    stats_kind: None,
                },
            });
        }

        // Pass 2: enqueue deeper listing pages (cards, categories, read-more).
        for link in &links {
            if !is_http_link(&link.href) {
                continue;
            }
            let Some(resolved) = resolve_url(&link.href, &source.base_url) else {
                continue;
            };
            if !same_host(&resolved, &host)
                || seen_pages.contains(&resolved)
                || is_file_url(&resolved)
            {
                continue;
            }
            let text = link.text.trim();
            if GENERIC_NAV.contains(&text.to_lowercase().as_str()) {
                continue;
            }
            if should_enqueue(&resolved, text) {
                let label = if text.len() > 2 {
                    text.to_string()
                } else {
                    url_basename(&resolved).replace('-', " ")
                };
                queue.push_back(QueueItem {
                    url: resolved,
                    breadcrumbs: push_crumb(&item.breadcrumbs, &label),
                    level: item.level.clone(),
                });
            }
        }
    }

    let docs = dedupe(collected);
    debug!(source = %source.key, pages, documents = docs.len(), "oag discovery done");
    docs
}

fn level_for(seed: &str) -> Option<&'static str> {
    let s = seed.to_lowercase();
    if s.contains("special-audit") {
        Some("special")
    } else if s.contains("specialized") {
        Some("specialized")
    } else if s.contains("county") {
        Some("county")
    } else if s.contains("national") {
        Some("national")
    } else {
        None
    }
}

fn noise_path(url: &str) -> bool {
    let path = Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_default();
    ["/wp-json/", "/feed/", "/tag/"].iter().any(|m| path.contains(m))
}

fn should_enqueue(url: &str, text: &str) -> bool {
    let path = Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_default();
    let t = text.to_lowercase();

    if ["/page/", "/audit", "/reports/", "/category/"]
        .iter()
        .any(|m| path.contains(m))
    {
        return true;
    }
    if super::extract_year(&t).is_some() || super::path_has_year(url) {
        return true;
    }
    if ["read more", "download", "report", "audit", "view"]
        .iter()
        .any(|k| t.contains(k))
    {
        return true;
    }
    CARD_TERMS.iter().any(|k| t.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_seed() {
        assert_eq!(
            level_for("https://www.oagkenya.go.ke/county-governments-reports/"),
            Some("county")
        );
        assert_eq!(
            level_for("https://www.oagkenya.go.ke/special-audit-report/"),
            Some("special")
        );
        assert_eq!(
            level_for("https://www.oagkenya.go.ke/specialized-audit-reports/"),
            Some("specialized")
        );
    }

    #[test]
    fn test_should_enqueue_heuristics() {
        assert!(should_enqueue("https://o.go.ke/county-funds/page/3/", ""));
        assert!(should_enqueue("https://o.go.ke/x/", "Read more"));
        assert!(should_enqueue("https://o.go.ke/x/", "State Corporations"));
        assert!(!should_enqueue("https://o.go.ke/about/", "Our mandate"));
    }

    #[test]
    fn test_noise_paths_filtered() {
        assert!(noise_path("https://o.go.ke/wp-json/wp/v2/posts"));
        assert!(!noise_path("https://o.go.ke/reports/a.pdf"));
    }
}
