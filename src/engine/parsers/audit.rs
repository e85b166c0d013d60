use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashSet;

use crate::domain::record::AuditFindingRecord;
use crate::domain::{EntityInfo, EntityType, NormalizedPeriod, ParsedRecord, Provenance, Severity};
use crate::engine::extractor::Extraction;
use crate::engine::normalizer::{county_names, Normalizer};

/// Heuristic baseline for findings surfaced by cue matching.
const BASELINE_CONFIDENCE: f64 = 0.6;

const CRITICAL_AMOUNT_KES: f64 = 50_000_000.0;
const WARNING_AMOUNT_KES: f64 = 5_000_000.0;

const CRITICAL_KEYWORDS: [&str; 5] = [
    "irregular expenditure",
    "unaccounted",
    "embezzlement",
    "misappropriation",
    "fraud",
];

const WARNING_KEYWORDS: [&str; 5] = [
    "non-compliance",
    "late submission",
    "procurement issue",
    "weak controls",
    "pending bills",
];

static MONEY_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(KES|Kshs?|USD)\b|US?\$|,\d{3}").unwrap());

static AUDIT_CUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)audit|query|finding|irregular|unaccounted|pending bills|procurement|unsupported|loss|embezzlement",
    )
    .unwrap()
});

static SECTION_CUES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)management responses?").unwrap(),
        Regex::new(r"(?i)audit findings?").unwrap(),
        Regex::new(r"(?i)recommendations?").unwrap(),
        Regex::new(r"(?i)basis of opinion").unwrap(),
        Regex::new(r"(?i)qualified opinion|adverse opinion|disclaimer").unwrap(),
    ]
});

static TABLE_DESCRIPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)description|finding|query|issue").unwrap());

static TABLE_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)amount|kes|ksh|value").unwrap());

static RECOMMENDATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)recommendation[:\-]\s*(.+)$").unwrap());

/// Heuristic parser for OAG and COB audit reports. Favors recall over
/// precision; downstream triage works off confidence and provenance.
#[derive(Debug, Clone, Default)]
pub struct AuditParser {
    normalizer: Normalizer,
}

impl AuditParser {
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    pub fn parse(&self, extraction: &Extraction, title: &str) -> Vec<ParsedRecord> {
        let entity_hint = self.infer_entity(title, extraction);
        let period_hint = self.detect_period(title, extraction);

        let mut findings = Vec::new();
        for page in &extraction.pages {
            if !page.text.is_empty() {
                findings.extend(self.parse_text_lines(
                    &page.text,
                    page.page_number,
                    &period_hint,
                    &entity_hint,
                ));
            }
        }
        findings.extend(self.parse_tables(extraction, &period_hint, &entity_hint));

        dedupe(findings)
    }

    /// County mention in the title is strong evidence; first-page text is a
    /// weaker fallback.
    fn infer_entity(&self, title: &str, extraction: &Extraction) -> Option<EntityInfo> {
        if let Some(info) = county_in_text(title, 0.9) {
            return Some(info);
        }
        extraction
            .pages
            .first()
            .and_then(|page| county_in_text(&page.text, 0.6))
    }

    fn detect_period(&self, title: &str, extraction: &Extraction) -> Option<NormalizedPeriod> {
        if let Some(period) = self.normalizer.normalize_fiscal_period(title) {
            return Some(period);
        }
        extraction
            .pages
            .iter()
            .take(2)
            .find_map(|page| self.normalizer.normalize_fiscal_period(&page.text))
    }

    fn parse_text_lines(
        &self,
        text: &str,
        page_number: u32,
        period_hint: &Option<NormalizedPeriod>,
        entity_hint: &Option<EntityInfo>,
    ) -> Vec<AuditFindingRecord> {
        let mut findings = Vec::new();

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let is_finding = MONEY_TOKEN.is_match(line)
                || AUDIT_CUE.is_match(line)
                || SECTION_CUES.iter().any(|cue| cue.is_match(line));
            if !is_finding {
                continue;
            }

            let amount = self.normalizer.normalize_amount(line, "");
            let amount_kes = amount
                .as_ref()
                .and_then(|a| a.base_amount.to_f64());
            let severity = classify_severity(line, amount_kes);
            let recommendation = extract_recommendation(line);

            let mut provenance = Provenance::for_page(page_number, BASELINE_CONFIDENCE);
            provenance.line = Some(line.chars().take(80).collect());

            findings.push(AuditFindingRecord {
                finding_text: line.to_string(),
                severity,
                recommended_action: recommendation,
                amount,
                entity: entity_hint.clone(),
                fiscal_period: period_hint.clone(),
                provenance,
            });
        }

        findings
    }

    fn parse_tables(
        &self,
        extraction: &Extraction,
        period_hint: &Option<NormalizedPeriod>,
        entity_hint: &Option<EntityInfo>,
    ) -> Vec<AuditFindingRecord> {
        let mut findings = Vec::new();

        for table in &extraction.tables {
            let joined_headers = table.data.headers.join(" ");
            let has_description = TABLE_DESCRIPTION.is_match(&joined_headers);
            let has_amount = TABLE_AMOUNT.is_match(&joined_headers);

            for (row_index, row) in table.data.rows.iter().enumerate() {
                let text_blob = row.join(" ");
                if !(has_description || has_amount || AUDIT_CUE.is_match(&text_blob)) {
                    continue;
                }

                let amount = self.normalizer.normalize_amount(&text_blob, "");
                let amount_kes = amount
                    .as_ref()
                    .and_then(|a| a.base_amount.to_f64());

                findings.push(AuditFindingRecord {
                    finding_text: text_blob.clone(),
                    severity: classify_severity(&text_blob, amount_kes),
                    recommended_action: extract_recommendation(&text_blob),
                    amount,
                    entity: entity_hint.clone(),
                    fiscal_period: period_hint.clone(),
                    provenance: Provenance::for_table(
                        table.page,
                        table.table_index,
                        row_index,
                        BASELINE_CONFIDENCE,
                    ),
                });
            }
        }

        findings
    }
}

fn county_in_text(text: &str, confidence: f64) -> Option<EntityInfo> {
    let lower = text.to_lowercase();
    for county in county_names() {
        if lower.contains(&county.to_lowercase()) {
            let mut info = EntityInfo::new(format!("{county} County"), EntityType::County)
                .with_confidence(confidence)
                .with_raw_name(county);
            info.category = Some("counties".to_string());
            return Some(info);
        }
    }
    None
}

/// Keyword lists first; amounts decide when no keyword matches.
pub fn classify_severity(text: &str, amount_kes: Option<f64>) -> Severity {
    let lower = text.to_lowercase();
    if CRITICAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Severity::Critical;
    }
    if WARNING_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Severity::Warning;
    }
    match amount_kes {
        Some(amount) if amount >= CRITICAL_AMOUNT_KES => Severity::Critical,
        Some(amount) if amount >= WARNING_AMOUNT_KES => Severity::Warning,
        _ => Severity::Info,
    }
}

fn extract_recommendation(text: &str) -> Option<String> {
    RECOMMENDATION
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
}

fn dedupe(findings: Vec<AuditFindingRecord>) -> Vec<ParsedRecord> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();

    for finding in findings {
        let key = (finding.finding_text.trim().to_string(), finding.provenance.page);
        if seen.insert(key) {
            unique.push(ParsedRecord::AuditFinding(finding));
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::extractor::ExtractionPage;

    fn extraction_with_page(text: &str) -> Extraction {
        let mut extraction = Extraction::empty("text_layout");
        extraction.pages.push(ExtractionPage {
            page_number: 1,
            text: text.to_string(),
            tables: Vec::new(),
        });
        extraction.confidence = 0.7;
        extraction
    }

    #[test]
    fn test_severity_amount_thresholds() {
        assert_eq!(
            classify_severity("query on spending", Some(50_000_000.0)),
            Severity::Critical
        );
        assert_eq!(
            classify_severity("query on spending", Some(5_000_000.0)),
            Severity::Warning
        );
        assert_eq!(
            classify_severity("query on spending", Some(100_000.0)),
            Severity::Info
        );
        assert_eq!(classify_severity("query on spending", None), Severity::Info);
    }

    #[test]
    fn test_severity_keywords_override_amount() {
        assert_eq!(
            classify_severity("embezzlement of minor funds", Some(1_000.0)),
            Severity::Critical
        );
        assert_eq!(
            classify_severity("pending bills outstanding", None),
            Severity::Warning
        );
    }

    #[test]
    fn test_nairobi_audit_line() {
        let parser = AuditParser::default();
        let extraction = extraction_with_page(
            "County Government of Nairobi\nFinancial Year 2022/23\nFinding: Unsupported payment of KES 12,345,678 for procurement. Recommendation: Recover the amount.",
        );

        let records = parser.parse(&extraction, "Nairobi County – Audit Report FY 2022/23");
        let finding = records
            .iter()
            .find_map(|r| match r {
                ParsedRecord::AuditFinding(f) if f.finding_text.starts_with("Finding:") => Some(f),
                _ => None,
            })
            .expect("finding line should be emitted");

        assert_eq!(finding.severity, Severity::Warning);
        assert_eq!(
            finding.recommended_action.as_deref(),
            Some("Recover the amount.")
        );
        assert_eq!(
            finding.entity.as_ref().unwrap().canonical_name,
            "Nairobi County"
        );
        assert_eq!(finding.entity.as_ref().unwrap().confidence, 0.9);
        assert_eq!(
            finding.fiscal_period.as_ref().unwrap().label,
            "FY2022/23"
        );
        assert_eq!(finding.provenance.page, Some(1));
    }

    #[test]
    fn test_dedupe_by_text_and_page() {
        let parser = AuditParser::default();
        let extraction = extraction_with_page(
            "Irregular expenditure of KES 1,000\nIrregular expenditure of KES 1,000",
        );
        let records = parser.parse(&extraction, "Audit Report");
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_plain_narrative_emits_nothing() {
        let parser = AuditParser::default();
        let extraction =
            extraction_with_page("The weather in July was mild.\nStaff attended a workshop.");
        assert!(parser.parse(&extraction, "Workshop notes").is_empty());
    }
}
