use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use tracing::debug;
use url::Url;

use crate::domain::DocumentType;
use crate::ingestion::fetcher::Fetcher;
use crate::ingestion::sources::SourceConfig;

use super::{
    dedupe, extract_year, is_excluded, is_file_link, is_file_url, is_http_link, host_key,
    page_links, paginated, path_has_year, push_crumb, resolve_url, same_host, title_or_basename,
    DiscoveredDoc, DocMeta, QueueItem,
};

const MAX_PAGES: usize = 300;

/// BFS over the Treasury's category pages. Category seeds get paginated
/// variants up front; deeper listing pages are enqueued as they are seen.
pub(super) async fn discover(fetcher: &Fetcher, source: &SourceConfig) -> Vec<DiscoveredDoc> {
    let Some(host) = host_key(&source.base_url) else {
        return Vec::new();
    };

    let mut queue: VecDeque<QueueItem> = source
        .seeds
        .iter()
        .map(|url| QueueItem {
            url: url.clone(),
            breadcrumbs: Vec::new(),
            level: None,
        })
        .collect();
    for seed in source.seeds.iter().filter(|s| s.contains("/category/")) {
        for url in paginated(seed, 2, 8) {
            queue.push_back(QueueItem {
                url,
                breadcrumbs: Vec::new(),
                level: None,
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

        for link in page_links(&body) {
            if !is_http_link(&link.href) {
                continue;
            }
            let Some(resolved) = resolve_url(&link.href, &source.base_url) else {
                continue;
            };
            if !same_host(&resolved, &host) {
                continue;
            }

            if is_file_link(&resolved, &link.text) {
                let title = title_or_basename(&link.text, &resolved);
                if is_excluded(&title, &resolved) {
                    continue;
                }
                collected.push(DiscoveredDoc {
                    url: resolved,
                    title: title.clone(),
                    source: source.name.clone(),
                    source_key: source.key.clone(),
                    doc_type: DocumentType::classify_title(&title),
                    discovered_at: Utc::now(),
                    meta: DocMeta {
                        breadcrumbs: item.breadcrumbs.clone(),
                        year: extract_year(&title),
                        level: None,
                        stats_kind: None,
                    },
                });
            } else if looks_like_list(&resolved, &link.text) && !seen_pages.contains(&resolved) {
                queue.push_back(QueueItem {
                    url: resolved,
                    breadcrumbs: push_crumb(&item.breadcrumbs, &link.text),
                    level: None,
                });
            }
        }
    }

    let docs = dedupe(collected);
    debug!(source = %source.key, pages, documents = docs.len(), "treasury discovery done");
    docs
}

/// Listing pages worth following: category/tag/pagination paths, year-like
/// path segments, or anchor text that names the document families.
fn looks_like_list(url: &str, text: &str) -> bool {
    if is_file_url(url) {
        return false;
    }
    let path = Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_default();
    if ["/category/", "/tag/", "/page/"].iter().any(|m| path.contains(m)) {
        return true;
    }
    if path_has_year(url) {
        return true;
    }
    let t = text.to_lowercase();
    [
        "previous years",
        "older posts",
        "qebr",
        "borrowing",
        "debt",
        "budget",
    ]
    .iter()
    .any(|k| t.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_list() {
        assert!(looks_like_list("https://t.go.ke/category/economy/", ""));
        assert!(looks_like_list("https://t.go.ke/qebr-archive/2021/", ""));
        assert!(looks_like_list("https://t.go.ke/x/", "Older posts"));
        assert!(!looks_like_list("https://t.go.ke/doc.pdf", "budget"));
        assert!(!looks_like_list("https://t.go.ke/contact/", "Contact us"));
    }
}
