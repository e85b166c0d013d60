use chrono::Utc;
use tracing::debug;

use crate::domain::DocumentType;
use crate::ingestion::fetcher::Fetcher;
use crate::ingestion::sources::SourceConfig;

use super::{
    dedupe, extract_year, host_key, is_excluded, is_file_link, is_http_link, page_links,
    resolve_url, same_host, title_or_basename, DiscoveredDoc, DocMeta,
};

/// Single-pass listing scan for sources without a bespoke strategy
/// (opendata, cra): file links on the seed pages only, no crawling.
pub(super) async fn discover(fetcher: &Fetcher, source: &SourceConfig) -> Vec<DiscoveredDoc> {
    let Some(host) = host_key(&source.base_url) else {
        return Vec::new();
    };

    let mut collected = Vec::new();

    for seed in &source.seeds {
        let Some(body) = fetcher.fetch_html(seed, &source.key).await else {
            continue;
        };
        for link in page_links(&body) {
            if !is_http_link(&link.href) {
                continue;
            }
            let Some(resolved) = resolve_url(&link.href, &source.base_url) else {
                continue;
            };
            if !same_host(&resolved, &host) || !is_file_link(&resolved, &link.text) {
                continue;
            }

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
                    breadcrumbs: Vec::new(),
                    year: extract_year(&title),
                    level: None,
                    stats_kind: None,
                },
            });
        }
    }

    let docs = dedupe(collected);
    debug!(source = %source.key, documents = docs.len(), "generic discovery done");
    docs
}
