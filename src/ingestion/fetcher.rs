//! Polite HTTP client: realistic UA, exponential backoff on transient
//! failures, per-host courtesy delay, and a TLS-verification fallback for
//! the government hosts that ship broken certificate chains.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use chrono::Utc;
use md5::{Digest, Md5};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::HttpSettings;
use crate::domain::{FiscalOpsError, Result};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Publishers with known-broken TLS chains; one insecure retry is allowed.
const INSECURE_FALLBACK_SOURCES: [&str; 2] = ["oag", "cob"];

const RETRY_STATUS: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Clone)]
pub struct Download {
    pub file_path: PathBuf,
    pub md5: String,
    pub bytes: u64,
    pub content_type: Option<String>,
}

pub struct Fetcher {
    client: reqwest::Client,
    insecure_client: reqwest::Client,
    settings: HttpSettings,
    downloads_dir: PathBuf,
    last_request: Mutex<HashMap<String, Instant>>,
    insecure_warned: StdMutex<HashSet<String>>,
}

impl Fetcher {
    pub fn new(settings: &HttpSettings, downloads_dir: &Path) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .pool_max_idle_per_host(16)
            .build()?;
        let insecure_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            client,
            insecure_client,
            settings: settings.clone(),
            downloads_dir: downloads_dir.to_path_buf(),
            last_request: Mutex::new(HashMap::new()),
            insecure_warned: StdMutex::new(HashSet::new()),
        })
    }

    /// Fetch a page and return the HTML body, or `None` on unrecoverable
    /// failure. Parsing happens downstream in discovery.
    pub async fn fetch_html(&self, url: &str, source_key: &str) -> Option<String> {
        match self.get(url, source_key, None).await {
            Ok(response) => response.text().await.ok(),
            Err(err) => {
                error!(url, source_key, error = %err, "html fetch failed");
                None
            }
        }
    }

    /// Fetch and decode a JSON endpoint (CMS media enumeration).
    pub async fn fetch_json(&self, url: &str, source_key: &str) -> Option<serde_json::Value> {
        match self.get(url, source_key, None).await {
            Ok(response) => response.json().await.ok(),
            Err(err) => {
                debug!(url, source_key, error = %err, "json fetch failed");
                None
            }
        }
    }

    /// Landing-page hash for change detection; short timeout, no retries on
    /// the happy path matter here.
    pub async fn fetch_page_hash(&self, url: &str, source_key: &str) -> Option<String> {
        let timeout = Duration::from_secs(self.settings.hash_timeout_secs);
        match self.get(url, source_key, Some(timeout)).await {
            Ok(response) => {
                let body = response.bytes().await.ok()?;
                Some(hex_md5(&body))
            }
            Err(_) => None,
        }
    }

    /// Download a document to the downloads directory and fingerprint it.
    pub async fn download(&self, url: &str, source_key: &str) -> Option<Download> {
        match self.try_download(url, source_key).await {
            Ok(download) => Some(download),
            Err(err) => {
                error!(url, source_key, error = %err, "download failed");
                None
            }
        }
    }

    async fn try_download(&self, url: &str, source_key: &str) -> Result<Download> {
        let response = self.get(url, source_key, None).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let disposition = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let body = response.bytes().await?;
        let md5 = hex_md5(&body);

        let basename = derive_basename(url, disposition.as_deref(), content_type.as_deref());
        let filename = format!(
            "{}_{}_{}",
            source_key,
            Utc::now().format("%Y%m%d_%H%M%S"),
            basename
        );
        tokio::fs::create_dir_all(&self.downloads_dir).await?;
        let file_path = self.downloads_dir.join(filename);
        tokio::fs::write(&file_path, &body).await?;

        debug!(url, path = %file_path.display(), bytes = body.len(), "downloaded");

        Ok(Download {
            file_path,
            md5,
            bytes: body.len() as u64,
            content_type,
        })
    }

    async fn get(
        &self,
        url: &str,
        source_key: &str,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response> {
        self.courtesy_wait(url).await;

        match self.get_with_retry(&self.client, url, timeout).await {
            Ok(response) => Ok(response),
            Err(err) => {
                if INSECURE_FALLBACK_SOURCES.contains(&source_key) {
                    self.warn_insecure_once(url);
                    let mut request = self.insecure_client.get(url);
                    if let Some(timeout) = timeout {
                        request = request.timeout(timeout);
                    }
                    let response = request.send().await?.error_for_status()?;
                    Ok(response)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn get_with_retry(
        &self,
        client: &reqwest::Client,
        url: &str,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response> {
        let mut policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_multiplier(1.5)
            .with_max_interval(Duration::from_secs(30))
            .with_max_elapsed_time(None)
            .build();

        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let mut request = client.get(url);
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }

            let retryable: FiscalOpsError = match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if !RETRY_STATUS.contains(&status) {
                        return response.error_for_status().map_err(Into::into);
                    }
                    FiscalOpsError::fetch(format!("HTTP {status} from {url}"))
                }
                Err(err) => err.into(),
            };

            if attempt >= self.settings.retry_attempts {
                return Err(FiscalOpsError::fetch(format!(
                    "giving up on {url} after {attempt} attempts: {retryable}"
                )));
            }

            let delay = policy
                .next_backoff()
                .unwrap_or_else(|| Duration::from_secs(30));
            warn!(url, attempt, delay_ms = delay.as_millis() as u64, "retrying fetch");
            tokio::time::sleep(delay).await;
        }
    }

    /// Minimum spacing between same-host requests. The lock is held across
    /// the sleep so same-host callers queue up behind each other.
    async fn courtesy_wait(&self, url: &str) {
        let Some(host) = host_of(url) else {
            return;
        };
        let delay = Duration::from_millis(self.settings.courtesy_delay_ms);
        if delay.is_zero() {
            return;
        }

        let mut guard = self.last_request.lock().await;
        if let Some(last) = guard.get(&host) {
            let elapsed = last.elapsed();
            if elapsed < delay {
                tokio::time::sleep(delay - elapsed).await;
            }
        }
        guard.insert(host, Instant::now());
    }

    fn warn_insecure_once(&self, url: &str) {
        let Some(host) = host_of(url) else {
            return;
        };
        let mut warned = self.insecure_warned.lock().unwrap();
        if warned.insert(host.clone()) {
            warn!(host = %host, "TLS verification failed, retrying without verification");
        }
    }
}

pub fn hex_md5(bytes: &[u8]) -> String {
    let digest = Md5::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|h| h.trim_start_matches("www.").to_string())
}

/// Basename for the stored file: URL path, then Content-Disposition, then a
/// content-type default.
fn derive_basename(url: &str, disposition: Option<&str>, content_type: Option<&str>) -> String {
    let from_path = Url::parse(url).ok().and_then(|u| {
        u.path_segments()
            .and_then(|segments| segments.last().map(|s| s.to_string()))
            .filter(|s| !s.is_empty())
    });

    let from_disposition = disposition.and_then(|d| {
        d.split("filename=")
            .nth(1)
            .map(|f| f.trim_matches(&['"', '\'', ' ', ';'][..]).to_string())
            .filter(|f| !f.is_empty())
    });

    let name = from_path.or(from_disposition).unwrap_or_else(|| {
        if content_type.is_some_and(|ct| ct.contains("pdf")) {
            "document.pdf".to_string()
        } else {
            "document.bin".to_string()
        }
    });

    sanitize_basename(&name)
}

fn sanitize_basename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    cleaned.chars().take(120).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_md5_known_value() {
        // md5("abc")
        assert_eq!(hex_md5(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_derive_basename_from_url() {
        assert_eq!(
            derive_basename("https://x.go.ke/docs/budget%20statement.pdf", None, None),
            "budget-20statement.pdf"
        );
    }

    #[test]
    fn test_derive_basename_from_disposition() {
        assert_eq!(
            derive_basename(
                "https://x.go.ke/download/",
                Some("attachment; filename=\"report 2024.pdf\""),
                None
            ),
            "report-2024.pdf"
        );
    }

    #[test]
    fn test_derive_basename_default_by_content_type() {
        assert_eq!(
            derive_basename("https://x.go.ke/", None, Some("application/pdf")),
            "document.pdf"
        );
        assert_eq!(derive_basename("https://x.go.ke/", None, None), "document.bin");
    }

    #[test]
    fn test_host_strips_www() {
        assert_eq!(
            host_of("https://www.treasury.go.ke/page/2/"),
            Some("treasury.go.ke".to_string())
        );
    }
}
