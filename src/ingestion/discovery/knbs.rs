use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

use crate::domain::DocumentType;
use crate::engine::parsers::StatisticsDocKind;
use crate::ingestion::fetcher::Fetcher;
use crate::ingestion::sources::SourceConfig;

use super::{
    dedupe, extract_year, host_key, is_excluded, is_file_link, is_http_link, page_links,
    paginated, push_crumb, resolve_url, same_host, title_or_basename, DiscoveredDoc, DocMeta,
    QueueItem,
};

const MAX_PAGES: usize = 200;

/// Statistics-bureau publication listings: paginated report archives. Every
/// emitted document is tagged with its publication family so the statistics
/// parser can dispatch without re-deriving it.
pub(super) async fn discover(fetcher: &Fetcher, source: &SourceConfig) -> Vec<DiscoveredDoc> {
    let Some(host) = host_key(&source.base_url) else {
        return Vec::new();
    };

    let mut queue: VecDeque<QueueItem> = VecDeque::new();
    for seed in &source.seeds {
        queue.push_back(QueueItem {
            url: seed.clone(),
            breadcrumbs: Vec::new(),
            level: None,
        });
        for url in paginated(seed, 2, 8) {
            queue.push_back(QueueItem {
                url,
                breadcrumbs: Vec::new(),
                level: None,
            });
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut collected = Vec::new();
    let mut pages = 0usize;

    while let Some(item) = queue.pop_front() {
        if pages >= MAX_PAGES || !seen.insert(item.url.clone()) {
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
                let stats_kind = StatisticsDocKind::classify_title(&title);
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
                        stats_kind: Some(stats_kind.as_str().to_string()),
                    },
                });
            } else if looks_like_list(&resolved, &link.text) && !seen.contains(&resolved) {
                queue.push_back(QueueItem {
                    url: resolved,
                    breadcrumbs: push_crumb(&item.breadcrumbs, &link.text),
                    level: None,
                });
            }
        }
    }

    let docs = dedupe(collected);
    debug!(source = %source.key, pages, documents = docs.len(), "knbs discovery done");
    docs
}

fn looks_like_list(url: &str, text: &str) -> bool {
    let lower = url.to_lowercase();
    if ["/page/", "/category/", "reports", "survey", "abstract", "publication"]
        .iter()
        .any(|m| lower.contains(m))
    {
        return true;
    }
    let t = text.to_lowercase();
    ["older", "next", "survey", "abstract", "statistics"]
        .iter()
        .any(|k| t.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_heuristics() {
        assert!(looks_like_list("https://knbs.or.ke/all-reports/page/2/", ""));
        assert!(looks_like_list("https://knbs.or.ke/x/", "Economic Survey archive"));
        assert!(!looks_like_list("https://knbs.or.ke/contact/", "Get in touch"));
    }
}
