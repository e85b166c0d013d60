use serde::{Deserialize, Serialize};

/// Kind of public body an entity represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    National,
    County,
    Ministry,
    Agency,
    Municipality,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::National => "national",
            EntityType::County => "county",
            EntityType::Ministry => "ministry",
            EntityType::Agency => "agency",
            EntityType::Municipality => "municipality",
        }
    }

    /// Parse a loosely-cased tag; anything unrecognized falls back to agency,
    /// which is the broadest bucket.
    pub fn parse_lossy(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "national" => EntityType::National,
            "county" => EntityType::County,
            "ministry" => EntityType::Ministry,
            "municipality" => EntityType::Municipality,
            _ => EntityType::Agency,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference country row. Seeded once per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Country {
    pub id: i64,
    pub iso_code: String,
    pub name: String,
    pub currency: String,
    pub timezone: String,
    pub default_locale: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Country {
    /// Defaults used when the pipeline lazily creates the Kenya row.
    pub fn kenya_defaults() -> Self {
        Self {
            id: 0,
            iso_code: "KEN".to_string(),
            name: "Kenya".to_string(),
            currency: "KES".to_string(),
            timezone: "Africa/Nairobi".to_string(),
            default_locale: "en_KE".to_string(),
            metadata: serde_json::json!({ "fiscal_year_start": "07-01" }),
        }
    }
}

/// Normalized reference to a public body, produced by the entity normalizer
/// and consumed by the loader's find-or-create path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityInfo {
    pub canonical_name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Mapping-table bucket the match came from (counties/ministries/agencies).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_name: Option<String>,
}

impl EntityInfo {
    pub fn new(canonical_name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            entity_type,
            category: None,
            confidence: 1.0,
            raw_name: None,
        }
    }

    /// National fallback used when a statistics record has no explicit entity.
    pub fn national() -> Self {
        Self::new("Kenya", EntityType::National)
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_raw_name(mut self, raw: impl Into<String>) -> Self {
        self.raw_name = Some(raw.into());
        self
    }

    /// Deterministic slug: lowercase, spaces to dashes, ampersand spelled out,
    /// alphanumerics and dashes only. Must stay stable across runs.
    pub fn slug(&self) -> String {
        slugify(&self.canonical_name)
    }
}

pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase().replace(' ', "-").replace('&', "and");
    lowered
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}
