use chrono::Utc;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{HashSet, VecDeque};
use tracing::debug;
use url::Url;

use crate::domain::DocumentType;
use crate::ingestion::fetcher::Fetcher;
use crate::ingestion::sources::SourceConfig;

use super::{
    dedupe, extract_year, host_key, is_file_url, is_http_link, page_links, paginated, push_crumb,
    resolve_url, same_host, title_or_basename, url_basename, DiscoveredDoc, DocMeta, QueueItem,
};

const MAX_PAGES: usize = 800;
const MAX_SITEMAP_DEPTH: usize = 3;
const MAX_SITEMAP_PAGE_FETCHES: usize = 100;
const WP_MEDIA_PAGE_SIZE: u32 = 100;
const WP_MEDIA_MAX_PAGES: u32 = 20;

/// Mime types the CMS media endpoint is asked for.
const WP_MEDIA_MIMES: [&str; 5] = [
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-excel",
    "text/csv",
    "application/zip",
];

/// Controller-of-Budget discovery: paginated BIRR sections, then a recursive
/// sitemap walk, then CMS REST media enumeration as a safety net.
pub(super) async fn discover(fetcher: &Fetcher, source: &SourceConfig) -> Vec<DiscoveredDoc> {
    let Some(host) = host_key(&source.base_url) else {
        return Vec::new();
    };

    let mut collected = Vec::new();
    crawl_sections(fetcher, source, &host, &mut collected).await;
    crawl_sitemaps(fetcher, source, &host, &mut collected).await;
    crawl_wp_media(fetcher, source, &host, &mut collected).await;

    let docs = dedupe(collected);
    debug!(source = %source.key, documents = docs.len(), "cob discovery done");
    docs
}

async fn crawl_sections(
    fetcher: &Fetcher,
    source: &SourceConfig,
    host: &str,
    collected: &mut Vec<DiscoveredDoc>,
) {
    let mut queue: VecDeque<QueueItem> = source
        .seeds
        .iter()
        .map(|url| QueueItem {
            url: url.clone(),
            breadcrumbs: vec!["reports".to_string()],
            level: None,
        })
        .collect();
    for seed in &source.seeds {
        for (i, url) in paginated(seed, 2, 21).into_iter().enumerate() {
            queue.push_back(QueueItem {
                url,
                breadcrumbs: vec!["reports".to_string(), format!("page {}", i + 2)],
                level: None,
            });
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
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
            if !same_host(&resolved, host) {
                continue;
            }

            if looks_like_download(&resolved) || link.text.to_lowercase().starts_with("download") {
                let title = title_or_basename(&link.text, &resolved);
                collected.push(make_doc(source, resolved, title, item.breadcrumbs.clone()));
            } else if looks_like_list(&resolved, &link.text) && !seen.contains(&resolved) {
                queue.push_back(QueueItem {
                    url: resolved.clone(),
                    breadcrumbs: push_crumb(
                        &item.breadcrumbs,
                        &title_or_basename(&link.text, &resolved),
                    ),
                    level: None,
                });
            }
        }
    }
}

/// Recursive walk of sitemap-index → sitemaps → urls. File URLs are taken
/// directly; attachment pages are fetched and scanned for file links.
async fn crawl_sitemaps(
    fetcher: &Fetcher,
    source: &SourceConfig,
    host: &str,
    collected: &mut Vec<DiscoveredDoc>,
) {
    let mut visited: HashSet<String> = HashSet::new();
    let mut page_fetches = 0usize;
    let roots = [
        format!("{}/sitemap_index.xml", source.base_url.trim_end_matches('/')),
        format!("{}/sitemap.xml", source.base_url.trim_end_matches('/')),
        format!("{}/wp-sitemap.xml", source.base_url.trim_end_matches('/')),
    ];

    // Manual stack instead of recursion: async recursion would need boxing.
    let mut stack: Vec<(String, usize)> = roots.into_iter().map(|u| (u, 0)).collect();

    while let Some((sitemap_url, depth)) = stack.pop() {
        if depth > MAX_SITEMAP_DEPTH || !visited.insert(sitemap_url.clone()) {
            continue;
        }
        let Some(body) = fetcher.fetch_html(&sitemap_url, &source.key).await else {
            continue;
        };
        let (is_index, locs) = parse_sitemap(&body);

        for loc in locs {
            if is_index {
                stack.push((loc, depth + 1));
                continue;
            }
            if !same_host(&loc, host) {
                continue;
            }
            if is_file_url(&loc) || loc.contains("/download/") {
                let title = url_basename(&loc);
                collected.push(make_doc(
                    source,
                    loc,
                    title,
                    vec!["sitemap".to_string()],
                ));
            } else {
                if page_fetches >= MAX_SITEMAP_PAGE_FETCHES {
                    continue;
                }
                page_fetches += 1;
                let Some(page) = fetcher.fetch_html(&loc, &source.key).await else {
                    continue;
                };
                for link in page_links(&page) {
                    if !is_http_link(&link.href) {
                        continue;
                    }
                    let Some(resolved) = resolve_url(&link.href, &source.base_url) else {
                        continue;
                    };
                    if same_host(&resolved, host)
                        && super::is_file_link(&resolved, &link.text)
                    {
                        let title = title_or_basename(&link.text, &resolved);
                        collected.push(make_doc(
                            source,
                            resolved,
                            title,
                            vec!["sitemap".to_string(), loc.clone()],
                        ));
                    }
                }
            }
        }
    }
}

/// CMS REST media enumeration by mime type, paginated. Documents found this
/// way carry a `wp-json` breadcrumb so consumers can see the provenance.
async fn crawl_wp_media(
    fetcher: &Fetcher,
    source: &SourceConfig,
    host: &str,
    collected: &mut Vec<DiscoveredDoc>,
) {
    let Some(endpoint) = &source.content_api else {
        return;
    };

    for mime in WP_MEDIA_MIMES {
        for page in 1..=WP_MEDIA_MAX_PAGES {
            let url = format!(
                "{endpoint}?per_page={WP_MEDIA_PAGE_SIZE}&page={page}&mime_type={mime}"
            );
            let Some(value) = fetcher.fetch_json(&url, &source.key).await else {
                break;
            };
            let Some(items) = value.as_array() else {
                break;
            };
            if items.is_empty() {
                break;
            }

            for item in items {
                let Some(src) = item.get("source_url").and_then(|v| v.as_str()) else {
                    continue;
                };
                if !same_host(src, host) || !is_file_url(src) {
                    continue;
                }
                let title = item
                    .get("title")
                    .and_then(|t| t.get("rendered"))
                    .and_then(|v| v.as_str())
                    .map(String::from)
                    .unwrap_or_else(|| url_basename(src));
                collected.push(make_doc(
                    source,
                    src.to_string(),
                    title,
                    vec!["wp-json".to_string()],
                ));
            }
        }
    }
}

fn make_doc(
    source: &SourceConfig,
    url: String,
    title: String,
    breadcrumbs: Vec<String>,
) -> DiscoveredDoc {
    let year = extract_year(&title);
    DiscoveredDoc {
        doc_type: DocumentType::classify_title(&title),
        title,
        source: source.name.clone(),
        source_key: source.key.clone(),
        discovered_at: Utc::now(),
        meta: DocMeta {
            breadcrumbs,
            year,
            level: None,
            stats_kind: None,
        },
        url,
    }
}

/// File link, download path, or the CMS attachment-page conventions.
fn looks_like_download(url: &str) -> bool {
    let u = url.to_lowercase();
    is_file_url(&u)
        || u.contains("/download/")
        || u.contains("mdocs-file=")
        || u.contains("wpdmpro=")
        || u.contains("/wp-content/uploads/")
}

fn looks_like_list(url: &str, text: &str) -> bool {
    let path = Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_default();
    if ["/reports/", "/category/", "/news/", "/updates/", "/tag/", "/page/"]
        .iter()
        .any(|m| path.contains(m))
    {
        return true;
    }
    let t = text.to_lowercase();
    if ["report", "budget", "implementation", "birr", "read more", "view"]
        .iter()
        .any(|k| t.contains(k))
    {
        return true;
    }
    super::path_has_year(url)
}

/// Returns (is_sitemap_index, loc values).
fn parse_sitemap(body: &str) -> (bool, Vec<String>) {
    let mut reader = Reader::from_str(body);

    let mut is_index = false;
    let mut in_loc = false;
    let mut locs = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = name.local_name();
                if local.as_ref() == b"sitemapindex" {
                    is_index = true;
                } else if local.as_ref() == b"loc" {
                    in_loc = true;
                }
            }
            Ok(Event::End(e)) => {
                if e.name().local_name().as_ref() == b"loc" {
                    in_loc = false;
                }
            }
            Ok(Event::Text(t)) if in_loc => {
                if let Ok(text) = t.unescape() {
                    let url = text.trim().to_string();
                    if !url.is_empty() {
                        locs.push(url);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    (is_index, locs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sitemap_urlset() {
        let xml = r#"<?xml version="1.0"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <url><loc>https://cob.go.ke/reports/q1.pdf</loc></url>
              <url><loc>https://cob.go.ke/attachment-page/</loc></url>
            </urlset>"#;
        let (is_index, locs) = parse_sitemap(xml);
        assert!(!is_index);
        assert_eq!(locs.len(), 2);
        assert_eq!(locs[0], "https://cob.go.ke/reports/q1.pdf");
    }

    #[test]
    fn test_parse_sitemap_index() {
        let xml = r#"<sitemapindex>
              <sitemap><loc>https://cob.go.ke/sitemap-1.xml</loc></sitemap>
            </sitemapindex>"#;
        let (is_index, locs) = parse_sitemap(xml);
        assert!(is_index);
        assert_eq!(locs, vec!["https://cob.go.ke/sitemap-1.xml"]);
    }

    #[test]
    fn test_download_conventions() {
        assert!(looks_like_download("https://cob.go.ke/download/1234/"));
        assert!(looks_like_download("https://cob.go.ke/?mdocs-file=99"));
        assert!(looks_like_download(
            "https://cob.go.ke/wp-content/uploads/2024/birr.pdf"
        ));
        assert!(!looks_like_download("https://cob.go.ke/reports/"));
    }
}
