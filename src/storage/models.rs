// Row models decoded from the relational store. Timestamps and dates are
// TEXT columns; monetary columns are canonical decimal strings.

use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CountryRow {
    pub id: i64,
    pub iso_code: String,
    pub name: String,
    pub currency: String,
    pub timezone: String,
    pub default_locale: String,
    pub metadata: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EntityRow {
    pub id: i64,
    pub country_id: i64,
    pub entity_type: String,
    pub canonical_name: String,
    pub slug: String,
    pub alt_names: String,
    pub metadata: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FiscalPeriodRow {
    pub id: i64,
    pub country_id: i64,
    pub label: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SourceDocumentRow {
    pub id: i64,
    pub country_id: i64,
    pub publisher: String,
    pub source_key: String,
    pub title: String,
    pub url: Option<String>,
    pub file_path: Option<String>,
    pub fetch_date: String,
    pub md5: Option<String>,
    pub doc_type: String,
    pub status: String,
    pub last_seen_at: String,
    pub metadata: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BudgetLineRow {
    pub id: i64,
    pub entity_id: i64,
    pub period_id: i64,
    pub category: String,
    pub subcategory: Option<String>,
    pub allocated_amount: Option<String>,
    pub actual_spent: Option<String>,
    pub committed_amount: Option<String>,
    pub currency: String,
    pub source_document_id: i64,
    pub page_ref: Option<String>,
    pub notes: Option<String>,
    pub provenance: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditRow {
    pub id: i64,
    pub entity_id: i64,
    pub period_id: i64,
    pub finding_text: String,
    pub severity: String,
    pub recommended_action: Option<String>,
    pub source_document_id: i64,
    pub provenance: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PopulationRow {
    pub id: i64,
    pub entity_id: i64,
    pub year: i64,
    pub total_population: i64,
    pub male_population: Option<i64>,
    pub female_population: Option<i64>,
    pub urban_population: Option<i64>,
    pub rural_population: Option<i64>,
    pub population_density: Option<f64>,
    pub source_document_id: i64,
    pub confidence: f64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GdpRow {
    pub id: i64,
    pub entity_id: Option<i64>,
    pub year: i64,
    pub quarter: Option<String>,
    pub gdp_value: f64,
    pub gdp_growth_rate: Option<f64>,
    pub currency: String,
    pub source_document_id: i64,
    pub confidence: f64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct IndicatorRow {
    pub id: i64,
    pub indicator_type: String,
    pub indicator_date: String,
    pub value: f64,
    pub unit: Option<String>,
    pub entity_id: Option<i64>,
    pub source_document_id: i64,
    pub confidence: f64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PovertyRow {
    pub id: i64,
    pub entity_id: i64,
    pub year: i64,
    pub poverty_rate: f64,
    pub poverty_gap: Option<f64>,
    pub source_document_id: i64,
    pub confidence: f64,
}
