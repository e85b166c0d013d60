use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Document classification derived from the title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Budget,
    Audit,
    Report,
    Loan,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Budget => "budget",
            DocumentType::Audit => "audit",
            DocumentType::Report => "report",
            DocumentType::Loan => "loan",
            DocumentType::Other => "other",
        }
    }

    pub fn parse_lossy(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "budget" => DocumentType::Budget,
            "audit" => DocumentType::Audit,
            "report" => DocumentType::Report,
            "loan" | "debt" | "borrowing" => DocumentType::Loan,
            _ => DocumentType::Other,
        }
    }

    /// Title-based classification. Budget terms take precedence, then audit,
    /// then debt, then implementation-review language.
    pub fn classify_title(title: &str) -> Self {
        let t = title.to_lowercase();
        const BUDGET: [&str; 4] = ["budget", "allocation", "appropriation", "estimates"];
        const AUDIT: [&str; 2] = ["audit", "auditor"];
        const LOAN: [&str; 3] = ["debt", "loan", "borrowing"];
        const REPORT: [&str; 3] = ["implementation", "review", "expenditure"];

        if BUDGET.iter().any(|w| t.contains(w)) {
            DocumentType::Budget
        } else if AUDIT.iter().any(|w| t.contains(w)) {
            DocumentType::Audit
        } else if LOAN.iter().any(|w| t.contains(w)) {
            DocumentType::Loan
        } else if REPORT.iter().any(|w| t.contains(w)) {
            DocumentType::Report
        } else {
            DocumentType::Other
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Available,
    Archived,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Available => "available",
            DocumentStatus::Archived => "archived",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn parse_lossy(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "archived" => DocumentStatus::Archived,
            "failed" => DocumentStatus::Failed,
            _ => DocumentStatus::Available,
        }
    }
}

/// Government debt categories per Treasury classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtCategory {
    ExternalMultilateral,
    ExternalBilateral,
    ExternalCommercial,
    DomesticBonds,
    DomesticBills,
    DomesticOverdraft,
    PendingBills,
    CountyGuaranteed,
    Other,
}

impl DebtCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebtCategory::ExternalMultilateral => "external_multilateral",
            DebtCategory::ExternalBilateral => "external_bilateral",
            DebtCategory::ExternalCommercial => "external_commercial",
            DebtCategory::DomesticBonds => "domestic_bonds",
            DebtCategory::DomesticBills => "domestic_bills",
            DebtCategory::DomesticOverdraft => "domestic_overdraft",
            DebtCategory::PendingBills => "pending_bills",
            DebtCategory::CountyGuaranteed => "county_guaranteed",
            DebtCategory::Other => "other",
        }
    }

    pub fn parse_lossy(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "external_multilateral" => DebtCategory::ExternalMultilateral,
            "external_bilateral" => DebtCategory::ExternalBilateral,
            "external_commercial" => DebtCategory::ExternalCommercial,
            "domestic_bonds" => DebtCategory::DomesticBonds,
            "domestic_bills" => DebtCategory::DomesticBills,
            "domestic_overdraft" => DebtCategory::DomesticOverdraft,
            "pending_bills" => DebtCategory::PendingBills,
            "county_guaranteed" => DebtCategory::CountyGuaranteed,
            _ => DebtCategory::Other,
        }
    }
}

/// Severity of an audit finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    pub fn parse_lossy(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "warning" => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance root handed to the loader after a successful fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub title: String,
    pub url: String,
    pub file_path: String,
    pub publisher: String,
    pub source_key: String,
    pub doc_type: DocumentType,
    pub fetch_date: DateTime<Utc>,
    pub md5: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl DocumentRecord {
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        assert_eq!(
            DocumentType::classify_title("County Allocation of Revenue Bill"),
            DocumentType::Budget
        );
        assert_eq!(
            DocumentType::classify_title("Report of the Auditor General FY2022/23"),
            DocumentType::Audit
        );
        assert_eq!(
            DocumentType::classify_title("Annual Borrowing Plan 2024"),
            DocumentType::Loan
        );
        assert_eq!(
            DocumentType::classify_title("Quarterly Expenditure Review"),
            DocumentType::Report
        );
        assert_eq!(
            DocumentType::classify_title("Gazette Notice Vol. 112"),
            DocumentType::Other
        );
    }

    #[test]
    fn test_budget_terms_take_precedence() {
        // Contains both budget and review language; the budget table wins.
        assert_eq!(
            DocumentType::classify_title("Budget Implementation Review Report"),
            DocumentType::Budget
        );
    }
}
