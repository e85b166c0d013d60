use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::Result;

/// One publisher in the catalogue. Read-only at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub key: String,
    pub name: String,
    pub country: String,
    pub base_url: String,
    /// Category/listing pages discovery starts from.
    #[serde(default)]
    pub seeds: Vec<String>,
    /// Document types this publisher is expected to produce.
    #[serde(default)]
    pub doc_type_hints: Vec<String>,
    /// CMS REST endpoint for media enumeration, where the site exposes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_api: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    sources: Vec<SourceConfig>,
}

/// Static catalogue of publishers keyed by source key.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: BTreeMap<String, SourceConfig>,
}

impl SourceRegistry {
    /// Load from a TOML file; a missing file yields the built-in Kenya
    /// catalogue (callers log the fallback).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::builtin());
        }
        let contents = std::fs::read_to_string(path)?;
        let file: RegistryFile = toml::from_str(&contents)?;
        if file.sources.is_empty() {
            return Ok(Self::builtin());
        }

        let mut sources = BTreeMap::new();
        for source in file.sources {
            sources.insert(source.key.clone(), source);
        }
        Ok(Self { sources })
    }

    pub fn builtin() -> Self {
        let mut sources = BTreeMap::new();
        for source in kenya_sources() {
            sources.insert(source.key.clone(), source);
        }
        Self { sources }
    }

    pub fn get(&self, key: &str) -> Option<&SourceConfig> {
        self.sources.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn by_country<'a>(&'a self, country: &'a str) -> impl Iterator<Item = &'a SourceConfig> {
        self.sources.values().filter(move |s| s.country == country)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

fn kenya_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            key: "treasury".into(),
            name: "National Treasury Kenya".into(),
            country: "KE".into(),
            base_url: "https://www.treasury.go.ke".into(),
            seeds: vec![
                "https://www.treasury.go.ke/annual-borrowing-plan/".into(),
                "https://www.treasury.go.ke/quarterly-economic-budgetary-review-qebr/".into(),
                "https://www.treasury.go.ke/category/economy/debt-management/".into(),
                "https://www.treasury.go.ke/category/budget/quarterly-economic-and-budgetary-review/"
                    .into(),
            ],
            doc_type_hints: vec!["budget".into(), "loan".into(), "report".into()],
            content_api: None,
        },
        SourceConfig {
            key: "cob".into(),
            name: "Controller of Budget".into(),
            country: "KE".into(),
            base_url: "https://cob.go.ke".into(),
            seeds: vec![
                "https://cob.go.ke/reports/consolidated-county-budget-implementation-review-reports/"
                    .into(),
                "https://cob.go.ke/reports/national-government-budget-implementation-review-reports/"
                    .into(),
                "https://cob.go.ke/reports/".into(),
            ],
            doc_type_hints: vec!["report".into(), "budget".into()],
            content_api: Some("https://cob.go.ke/wp-json/wp/v2/media".into()),
        },
        SourceConfig {
            key: "oag".into(),
            name: "Office of the Auditor General".into(),
            country: "KE".into(),
            base_url: "https://www.oagkenya.go.ke".into(),
            seeds: vec![
                "https://www.oagkenya.go.ke/national-government-audit-reports/".into(),
                "https://www.oagkenya.go.ke/county-governments-reports/".into(),
                "https://www.oagkenya.go.ke/specialized-audit-reports/".into(),
                "https://www.oagkenya.go.ke/special-audit-report/".into(),
            ],
            doc_type_hints: vec!["audit".into()],
            content_api: None,
        },
        SourceConfig {
            key: "knbs".into(),
            name: "Kenya National Bureau of Statistics".into(),
            country: "KE".into(),
            base_url: "https://www.knbs.or.ke".into(),
            seeds: vec![
                "https://www.knbs.or.ke/all-reports/".into(),
                "https://www.knbs.or.ke/economic-surveys/".into(),
                "https://www.knbs.or.ke/statistical-abstracts/".into(),
            ],
            doc_type_hints: vec!["report".into()],
            content_api: None,
        },
        SourceConfig {
            key: "opendata".into(),
            name: "Kenya Open Data".into(),
            country: "KE".into(),
            base_url: "https://opendata.go.ke".into(),
            seeds: vec!["https://opendata.go.ke/datasets/".into()],
            doc_type_hints: vec!["other".into()],
            content_api: None,
        },
        SourceConfig {
            key: "cra".into(),
            name: "Commission on Revenue Allocation".into(),
            country: "KE".into(),
            base_url: "https://cra.go.ke".into(),
            seeds: vec!["https://cra.go.ke/publications/".into()],
            doc_type_hints: vec!["budget".into(), "report".into()],
            content_api: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_six_sources() {
        let registry = SourceRegistry::builtin();
        assert_eq!(registry.len(), 6);
        for key in ["treasury", "cob", "oag", "knbs", "opendata", "cra"] {
            assert!(registry.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_missing_file_falls_back_to_builtin() {
        let registry = SourceRegistry::load(Path::new("/nonexistent/sources.toml")).unwrap();
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn test_load_from_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.toml");
        std::fs::write(
            &path,
            r#"
[[sources]]
key = "treasury"
name = "Treasury Test"
country = "KE"
base_url = "http://localhost:8080"
seeds = ["http://localhost:8080/docs/"]
"#,
        )
        .unwrap();

        let registry = SourceRegistry::load(&path).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("treasury").unwrap().name, "Treasury Test");
    }
}
