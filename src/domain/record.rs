use serde::{Deserialize, Serialize};

use super::entity::EntityInfo;
use super::money::NormalizedAmount;
use super::period::NormalizedPeriod;
use super::Severity;

/// Back-reference from a fact record to the page/table/row it came from.
/// The loader prepends `source_document_id` when persisting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_date: Option<String>,
    /// First characters of the source line for text-derived findings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
}

impl Provenance {
    pub fn for_page(page: u32, confidence: f64) -> Self {
        Self {
            page: Some(page),
            confidence,
            ..Default::default()
        }
    }

    pub fn for_table(page: u32, table_index: usize, row_index: usize, confidence: f64) -> Self {
        Self {
            page: Some(page),
            table_index: Some(table_index),
            row_index: Some(row_index),
            confidence,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetLineRecord {
    pub entity: EntityInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiscal_period: Option<NormalizedPeriod>,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocated_amount: Option<NormalizedAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_amount: Option<NormalizedAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed_amount: Option<NormalizedAmount>,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditFindingRecord {
    pub finding_text: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<NormalizedAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiscal_period: Option<NormalizedPeriod>,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityInfo>,
    pub year: i32,
    pub total_population: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub male_population: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub female_population: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urban_population: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rural_population: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population_density: Option<f64>,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GdpRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityInfo>,
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarter: Option<String>,
    /// Value in base KES.
    pub gdp_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_rate: Option<f64>,
    pub currency: String,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorRecord {
    pub indicator_type: String,
    /// Period label such as `2025-05`, `2025-Q2` or `2025`.
    pub period: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityInfo>,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PovertyRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityInfo>,
    pub year: i32,
    /// Headcount ratio in percent, 0..100.
    pub poverty_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poverty_gap: Option<f64>,
    pub provenance: Provenance,
}

/// Heterogeneous record flowing from parsers to the loader, discriminated by
/// the `_kind` tag on the wire. The loader's dispatch is an exhaustive match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "_kind", rename_all = "snake_case")]
pub enum ParsedRecord {
    BudgetLine(BudgetLineRecord),
    AuditFinding(AuditFindingRecord),
    PopulationData(PopulationRecord),
    GdpData(GdpRecord),
    EconomicIndicator(IndicatorRecord),
    PovertyIndex(PovertyRecord),
}

impl ParsedRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            ParsedRecord::BudgetLine(_) => "budget_line",
            ParsedRecord::AuditFinding(_) => "audit_finding",
            ParsedRecord::PopulationData(_) => "population_data",
            ParsedRecord::GdpData(_) => "gdp_data",
            ParsedRecord::EconomicIndicator(_) => "economic_indicator",
            ParsedRecord::PovertyIndex(_) => "poverty_index",
        }
    }

    pub fn provenance(&self) -> &Provenance {
        match self {
            ParsedRecord::BudgetLine(r) => &r.provenance,
            ParsedRecord::AuditFinding(r) => &r.provenance,
            ParsedRecord::PopulationData(r) => &r.provenance,
            ParsedRecord::GdpData(r) => &r.provenance,
            ParsedRecord::EconomicIndicator(r) => &r.provenance,
            ParsedRecord::PovertyIndex(r) => &r.provenance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tag_round_trips() {
        let record = ParsedRecord::PopulationData(PopulationRecord {
            entity: None,
            year: 2023,
            total_population: 47_600_000,
            male_population: None,
            female_population: None,
            urban_population: None,
            rural_population: None,
            population_density: None,
            provenance: Provenance::for_page(3, 0.8),
        });

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["_kind"], "population_data");

        let back: ParsedRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), "population_data");
    }
}
