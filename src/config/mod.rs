use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub rates: RateTable,
    #[serde(default)]
    pub notify: NotifySettings,
    #[serde(default)]
    pub backfill: BackfillSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Download directory; also holds the processed manifest.
    pub downloads_dir: PathBuf,
    /// Run artifacts: summaries, discovery TSVs, known-URL lists.
    pub reports_dir: PathBuf,
    /// Registry file; missing file falls back to built-in Kenya sources.
    pub sources_file: PathBuf,
    /// Mirror root for the filesystem blob store. Unset disables mirroring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_dir: Option<PathBuf>,
    /// Bucket name advertised in mirror metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_bucket: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_hash_timeout_secs")]
    pub hash_timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Minimum delay between requests to the same host, milliseconds.
    #[serde(default = "default_courtesy_delay_ms")]
    pub courtesy_delay_ms: u64,
    /// Pause between documents of the same source during a run.
    #[serde(default = "default_document_delay_ms")]
    pub document_delay_ms: u64,
}

/// Static currency table. Rates are configuration, not data; tests may
/// substitute a fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTable {
    /// Currency code to KES conversion rate.
    pub to_kes: HashMap<String, Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifySettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack_webhook_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagerduty_integration_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillSettings {
    #[serde(default = "default_backfill_sources")]
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_from: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_to: Option<i32>,
    #[serde(default = "default_backfill_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_run_migrations() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_hash_timeout_secs() -> u64 {
    15
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_courtesy_delay_ms() -> u64 {
    1000
}

fn default_document_delay_ms() -> u64 {
    1000
}

fn default_smtp_port() -> u16 {
    587
}

fn default_backfill_sources() -> Vec<String> {
    vec!["treasury".into(), "cob".into(), "oag".into()]
}

fn default_backfill_concurrency() -> usize {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://fiscal-ops.db".to_string(),
            max_connections: default_max_connections(),
            run_migrations: default_run_migrations(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from("downloads"),
            reports_dir: PathBuf::from("reports"),
            sources_file: PathBuf::from("sources.toml"),
            mirror_dir: None,
            mirror_bucket: None,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            hash_timeout_secs: default_hash_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            courtesy_delay_ms: default_courtesy_delay_ms(),
            document_delay_ms: default_document_delay_ms(),
        }
    }
}

impl Default for RateTable {
    fn default() -> Self {
        let mut to_kes = HashMap::new();
        to_kes.insert("KES".to_string(), Decimal::ONE);
        // CBK mid-rate; refresh in deployment config, not code.
        to_kes.insert("USD".to_string(), Decimal::new(129, 0));
        Self { to_kes }
    }
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            sources: default_backfill_sources(),
            year_from: None,
            year_to: None,
            concurrency: default_backfill_concurrency(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseSettings::default(),
            storage: StorageSettings::default(),
            http: HttpSettings::default(),
            rates: RateTable::default(),
            notify: NotifySettings::default(),
            backfill: BackfillSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl RateTable {
    pub fn rate_to_kes(&self, currency: &str) -> Option<Decimal> {
        self.to_kes.get(&currency.to_uppercase()).copied()
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from the given file if present, then apply environment
    /// overrides. Missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => Self::from_file(p)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Environment variables recognized by the platform. `DATABASE_URL`
    /// wins over the `DB_*` parts.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                self.database.url = url;
            }
        } else if let Some(url) = database_url_from_parts() {
            self.database.url = url;
        }

        if let Ok(sources) = std::env::var("BACKFILL_SOURCES") {
            let parsed: Vec<String> = sources
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                self.backfill.sources = parsed;
            }
        }
        if let Some(year) = env_parse::<i32>("BACKFILL_YEAR_FROM") {
            self.backfill.year_from = Some(year);
        }
        if let Some(year) = env_parse::<i32>("BACKFILL_YEAR_TO") {
            self.backfill.year_to = Some(year);
        }
        if let Some(concurrency) = env_parse::<usize>("BACKFILL_CONCURRENCY") {
            self.backfill.concurrency = concurrency.max(1);
        }
        if let Ok(dir) = std::env::var("BACKFILL_STORAGE") {
            if !dir.is_empty() {
                self.storage.downloads_dir = PathBuf::from(dir);
            }
        }

        if let Ok(host) = std::env::var("SMTP_HOST") {
            if !host.is_empty() {
                self.notify.smtp_host = Some(host);
            }
        }
        if let Some(port) = env_parse::<u16>("SMTP_PORT") {
            self.notify.smtp_port = port;
        }
        if let Ok(user) = std::env::var("SMTP_USER") {
            if !user.is_empty() {
                self.notify.smtp_user = Some(user);
            }
        }
        if let Ok(password) = std::env::var("SMTP_PASSWORD") {
            if !password.is_empty() {
                self.notify.smtp_password = Some(password);
            }
        }
        if let Ok(to) = std::env::var("NOTIFY_EMAIL_TO") {
            if !to.is_empty() {
                self.notify.email_to = Some(to);
            }
        }
        if let Ok(webhook) = std::env::var("SLACK_WEBHOOK_URL") {
            if !webhook.is_empty() {
                self.notify.slack_webhook_url = Some(webhook);
            }
        }
        if let Ok(key) = std::env::var("PAGERDUTY_INTEGRATION_KEY") {
            if !key.is_empty() {
                self.notify.pagerduty_integration_key = Some(key);
            }
        }

        if let Ok(bucket) = std::env::var("AWS_BUCKET_NAME") {
            if !bucket.is_empty() {
                self.storage.mirror_bucket = Some(bucket);
            }
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.storage.downloads_dir.join("processed_manifest.json")
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Compose a connection URL from the `DB_*` variable family used by managed
/// poolers.
fn database_url_from_parts() -> Option<String> {
    let user = std::env::var("DB_USER").ok()?;
    let password = std::env::var("DB_PASSWORD").unwrap_or_default();
    let host = std::env::var("DB_HOST").ok()?;
    let port = std::env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
    let name = std::env::var("DB_NAME").ok()?;
    let sslmode = std::env::var("DB_SSLMODE").unwrap_or_default();

    let mut url = format!("postgresql://{user}:{password}@{host}:{port}/{name}");
    if !sslmode.is_empty() {
        url.push_str(&format!("?sslmode={sslmode}"));
    }
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.http.courtesy_delay_ms, 1000);
        assert_eq!(config.backfill.concurrency, 3);
        assert_eq!(config.rates.rate_to_kes("KES"), Some(Decimal::ONE));
    }

    #[test]
    fn test_rate_lookup_is_case_insensitive() {
        let config = Config::default();
        assert!(config.rates.rate_to_kes("usd").is_some());
        assert!(config.rates.rate_to_kes("EUR").is_none());
    }

    #[test]
    fn test_manifest_path_under_downloads() {
        let config = Config::default();
        assert!(config
            .manifest_path()
            .ends_with("downloads/processed_manifest.json"));
    }
}
