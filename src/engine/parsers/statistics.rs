use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::domain::record::{GdpRecord, IndicatorRecord, PopulationRecord, PovertyRecord};
use crate::domain::{EntityInfo, ParsedRecord, Provenance};
use crate::engine::extractor::{ExtractedTable, Extraction};
use crate::engine::normalizer::Normalizer;

// Sanity bounds; values outside are dropped rather than flagged.
const POPULATION_MIN: i64 = 10_000_000;
const POPULATION_MAX: i64 = 100_000_000;
const TABLE_POPULATION_MIN: i64 = 10_000;
const GDP_MIN_KES: f64 = 1_000_000_000_000.0;
const GDP_MAX_KES: f64 = 50_000_000_000_000.0;
const RATE_MIN: f64 = 0.0;
const RATE_MAX: f64 = 50.0;
const POVERTY_MAX: f64 = 100.0;
const GROWTH_MIN: f64 = -10.0;
const GROWTH_MAX: f64 = 20.0;

/// Statistics publication families published by the national statistics
/// bureau, classified from the document title at discovery time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticsDocKind {
    EconomicSurvey,
    StatisticalAbstract,
    CountyAbstract,
    QuarterlyGdp,
    CpiInflation,
    FactsFigures,
    Generic,
}

impl StatisticsDocKind {
    pub fn classify_title(title: &str) -> Self {
        let t = title.to_lowercase();
        if t.contains("economic survey") {
            StatisticsDocKind::EconomicSurvey
        } else if t.contains("county statistical abstract") {
            StatisticsDocKind::CountyAbstract
        } else if t.contains("statistical abstract") {
            StatisticsDocKind::StatisticalAbstract
        } else if t.contains("gross domestic product") || t.contains("quarterly gdp") {
            StatisticsDocKind::QuarterlyGdp
        } else if t.contains("consumer price") || t.contains("cpi") || t.contains("inflation") {
            StatisticsDocKind::CpiInflation
        } else if t.contains("facts and figures") || t.contains("facts & figures") {
            StatisticsDocKind::FactsFigures
        } else {
            StatisticsDocKind::Generic
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticsDocKind::EconomicSurvey => "economic_survey",
            StatisticsDocKind::StatisticalAbstract => "statistical_abstract",
            StatisticsDocKind::CountyAbstract => "county_abstract",
            StatisticsDocKind::QuarterlyGdp => "quarterly_gdp",
            StatisticsDocKind::CpiInflation => "cpi_inflation",
            StatisticsDocKind::FactsFigures => "facts_figures",
            StatisticsDocKind::Generic => "generic",
        }
    }
}

static POPULATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)(?:total\s+)?population[:\s]+([0-9]+\.?[0-9]*)\s*(?:million|m\b)").unwrap(),
        Regex::new(r"(?i)population(?:[:\s]+of)?[:\s]+([0-9]{2,3}(?:,[0-9]{3})+)").unwrap(),
        Regex::new(r"(?i)population\s+(?:is|was|stands\s+at|estimated\s+at)[:\s]+([0-9]+\.?[0-9]*)")
            .unwrap(),
        Regex::new(r"(?i)\b([4-5][0-9]\.[0-9])\s*million\s+(?:people|kenyans|population)").unwrap(),
        Regex::new(r"(?i)(?:census|enumeration)[:\s]+(?:total[:\s]+)?([0-9]{2,3}(?:,[0-9]{3})+)")
            .unwrap(),
    ]
});

static GDP_VALUE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(
            r"(?i)(?:gdp|gross\s+domestic\s+product)[:\s]+(?:ksh\.?|kshs?\.?)?[:\s]*([0-9]+\.?[0-9]*)\s*(?:trillion|tn\b)",
        )
        .unwrap(),
        Regex::new(
            r"(?i)(?:gdp|gross\s+domestic\s+product)[:\s]+(?:of\s+)?(?:ksh\.?|kshs?\.?)?[:\s]*([0-9,]+(?:\.[0-9]+)?)\s*(?:billion|bn\b)",
        )
        .unwrap(),
        Regex::new(
            r"(?i)gdp\s+(?:stood\s+at|was|is|estimated\s+at)[:\s]+(?:ksh\.?)?[:\s]*([0-9,]+(?:\.[0-9]+)?)\s*(?:trillion|billion|million)",
        )
        .unwrap(),
        Regex::new(
            r"(?i)economy\s+(?:recorded|grew\s+to|expanded\s+to)[:\s]+(?:ksh\.?)?[:\s]*([0-9]+\.?[0-9]*)\s*(?:trillion|tn\b)",
        )
        .unwrap(),
    ]
});

static GDP_GROWTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:gdp\s+)?growth\s+(?:of\s+|rate\s+of\s+)?(-?[0-9]+\.?[0-9]*)%").unwrap());

static INFLATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)inflation\s+rate[:\s]+([0-9]+\.[0-9]+)\s*%").unwrap(),
        Regex::new(r"(?i)overall\s+inflation[:\s]+([0-9]+\.[0-9]+)\s*%").unwrap(),
        Regex::new(r"(?i)annual\s+inflation\s+(?:of|at)[:\s]*([0-9]+\.[0-9]+)\s*%").unwrap(),
    ]
});

static UNEMPLOYMENT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)unemployment\s+rate[:\s]+(?:of\s+)?([0-9]+\.?[0-9]*)\s*%").unwrap(),
        Regex::new(r"(?i)unemployment\s+(?:stood\s+at|was|is)[:\s]+([0-9]+\.?[0-9]*)\s*%").unwrap(),
    ]
});

static POVERTY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)poverty\s+(?:rate|headcount|index)[:\s]+(?:of\s+)?([0-9]+\.?[0-9]*)\s*%")
            .unwrap(),
        Regex::new(r"(?i)([0-9]+\.?[0-9]*)\s*%\s+(?:of\s+\w+\s+)?liv(?:e|ing)\s+below\s+the\s+poverty")
            .unwrap(),
    ]
});

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").unwrap());
static QUARTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:q|quarter\s*)([1-4])\b").unwrap());

static GCP_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:gcp|gross county product|gross value added)\b").unwrap());

/// Parser for statistics-bureau publications: population, GDP and
/// gross-county-product series, CPI/inflation, unemployment and poverty.
#[derive(Debug, Clone, Default)]
pub struct StatisticsParser {
    normalizer: Normalizer,
}

impl StatisticsParser {
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    pub fn parse(&self, extraction: &Extraction, title: &str) -> Vec<ParsedRecord> {
        let kind = StatisticsDocKind::classify_title(title);
        let year_hint = extract_year(title);
        let quarter_hint = extract_quarter(title);
        let county_hint = self.county_hint(title, kind);

        let mut records = Vec::new();

        for page in &extraction.pages {
            if page.text.trim().is_empty() {
                continue;
            }
            records.extend(self.parse_page_text(
                &page.text,
                page.page_number,
                year_hint,
                quarter_hint.as_deref(),
                county_hint.as_ref(),
                kind,
            ));
        }

        for table in &extraction.tables {
            records.extend(self.parse_table(table, year_hint, county_hint.as_ref()));
        }

        debug!(
            kind = kind.as_str(),
            count = records.len(),
            "statistics records parsed"
        );
        records
    }

    fn county_hint(&self, title: &str, kind: StatisticsDocKind) -> Option<EntityInfo> {
        if kind != StatisticsDocKind::CountyAbstract {
            return None;
        }
        // "Kiambu County Statistical Abstract 2023": the leading words name
        // the county.
        let head = title
            .to_lowercase()
            .split("county")
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
        self.normalizer.normalize_entity_name(&head)
    }

    fn parse_page_text(
        &self,
        text: &str,
        page_number: u32,
        year_hint: Option<i32>,
        quarter_hint: Option<&str>,
        county_hint: Option<&EntityInfo>,
        kind: StatisticsDocKind,
    ) -> Vec<ParsedRecord> {
        let clean = collapse_whitespace(text);
        let year = extract_year(&clean).or(year_hint).unwrap_or(current_year());
        let provenance = Provenance::for_page(page_number, 0.7);
        let mut records = Vec::new();

        if let Some(population) = extract_population(&clean) {
            records.push(ParsedRecord::PopulationData(PopulationRecord {
                entity: county_hint.cloned(),
                year,
                total_population: population,
                male_population: None,
                female_population: None,
                urban_population: None,
                rural_population: None,
                population_density: None,
                provenance: provenance.clone(),
            }));
        }

        let growth = extract_gdp_growth(&clean);
        if let Some(gdp_value) = extract_gdp_value(&clean) {
            records.push(ParsedRecord::GdpData(GdpRecord {
                entity: county_hint.cloned(),
                year,
                quarter: quarter_hint.map(|q| q.to_string()),
                gdp_value,
                growth_rate: growth,
                currency: "KES".to_string(),
                provenance: provenance.clone(),
            }));
        }

        if let Some(rate) = first_bounded(&INFLATION_PATTERNS, &clean, RATE_MIN, RATE_MAX) {
            records.push(ParsedRecord::EconomicIndicator(IndicatorRecord {
                indicator_type: "inflation_rate".to_string(),
                period: period_label(year, quarter_hint),
                value: rate,
                unit: Some("percent".to_string()),
                entity: None,
                provenance: provenance.clone(),
            }));
        }

        if let Some(rate) = first_bounded(&UNEMPLOYMENT_PATTERNS, &clean, RATE_MIN, RATE_MAX) {
            records.push(ParsedRecord::EconomicIndicator(IndicatorRecord {
                indicator_type: "unemployment_rate".to_string(),
                period: period_label(year, quarter_hint),
                value: rate,
                unit: Some("percent".to_string()),
                entity: None,
                provenance: provenance.clone(),
            }));
        }

        // Poverty series mostly appear in survey and abstract publications.
        if matches!(
            kind,
            StatisticsDocKind::EconomicSurvey
                | StatisticsDocKind::StatisticalAbstract
                | StatisticsDocKind::CountyAbstract
                | StatisticsDocKind::FactsFigures
                | StatisticsDocKind::Generic
        ) {
            if let Some(rate) = first_bounded(&POVERTY_PATTERNS, &clean, RATE_MIN, POVERTY_MAX) {
                records.push(ParsedRecord::PovertyIndex(PovertyRecord {
                    entity: county_hint.cloned(),
                    year,
                    poverty_rate: rate,
                    poverty_gap: None,
                    provenance,
                }));
            }
        }

        records
    }

    fn parse_table(
        &self,
        table: &ExtractedTable,
        year_hint: Option<i32>,
        county_hint: Option<&EntityInfo>,
    ) -> Vec<ParsedRecord> {
        let mut records = self.population_from_table(table, year_hint, county_hint);
        records.extend(self.gdp_from_table(table, county_hint));
        records
    }

    fn population_from_table(
        &self,
        table: &ExtractedTable,
        year_hint: Option<i32>,
        county_hint: Option<&EntityInfo>,
    ) -> Vec<ParsedRecord> {
        let headers: Vec<String> = table
            .data
            .headers
            .iter()
            .map(|h| h.to_lowercase())
            .collect();

        let mut year_col = None;
        let mut pop_col = None;
        let mut county_col = None;
        for (i, header) in headers.iter().enumerate() {
            if header.contains("year") || header.contains("period") {
                year_col.get_or_insert(i);
            } else if header.contains("population") {
                if header.contains("total") {
                    pop_col = Some(i);
                } else {
                    pop_col.get_or_insert(i);
                }
            } else if header.contains("county") || header.contains("region") {
                county_col.get_or_insert(i);
            }
        }

        let Some(pop_col) = pop_col else {
            return Vec::new();
        };

        let mut records = Vec::new();
        for (row_index, row) in table.data.rows.iter().enumerate() {
            let Some(cell) = row.get(pop_col) else {
                continue;
            };
            let Some(population) = parse_integer(cell) else {
                continue;
            };
            if !(TABLE_POPULATION_MIN..=POPULATION_MAX).contains(&population) {
                continue;
            }

            let year = year_col
                .and_then(|i| row.get(i))
                .and_then(|c| extract_year(c))
                .or(year_hint)
                .unwrap_or(current_year());
            let entity = county_col
                .and_then(|i| row.get(i))
                .and_then(|c| self.normalizer.normalize_entity_name(c.trim()))
                .or_else(|| county_hint.cloned());

            records.push(ParsedRecord::PopulationData(PopulationRecord {
                entity,
                year,
                total_population: population,
                male_population: None,
                female_population: None,
                urban_population: None,
                rural_population: None,
                population_density: None,
                provenance: Provenance::for_table(table.page, table.table_index, row_index, 0.8),
            }));
        }
        records
    }

    /// Gross-County-Product layout: activities down the side, one column per
    /// year, unit taken from the caption row. Also handles plain GDP columns.
    fn gdp_from_table(
        &self,
        table: &ExtractedTable,
        county_hint: Option<&EntityInfo>,
    ) -> Vec<ParsedRecord> {
        let header_text = table.data.headers.join(" ").to_lowercase();
        let column_year_map = column_years(table);
        if column_year_map.is_empty() {
            return Vec::new();
        }

        let unit_multiplier = if header_text.contains("billion") {
            1_000_000_000.0
        } else if header_text.contains("million") {
            1_000_000.0
        } else if header_text.contains("thousand") {
            1_000.0
        } else if header_text.contains("ksh") || header_text.contains("kes") {
            1_000_000.0
        } else {
            1.0
        };

        let mut records = Vec::new();
        for (row_index, row) in table.data.rows.iter().enumerate() {
            let label = row.first().map(|c| c.trim()).unwrap_or("");
            if !GCP_LABEL.is_match(label) {
                continue;
            }

            // The row label often names the county ("GCP Kiambu").
            let entity = self
                .normalizer
                .normalize_entity_name(strip_gcp_prefix(label))
                .or_else(|| county_hint.cloned());

            for (&col, &year) in &column_year_map {
                let Some(cell) = row.get(col) else {
                    continue;
                };
                let Some(value) = parse_numeric(cell) else {
                    continue;
                };
                records.push(ParsedRecord::GdpData(GdpRecord {
                    entity: entity.clone(),
                    year,
                    quarter: None,
                    gdp_value: value * unit_multiplier,
                    growth_rate: None,
                    currency: "KES".to_string(),
                    provenance: Provenance::for_table(
                        table.page,
                        table.table_index,
                        row_index,
                        0.8,
                    ),
                }));
            }
        }
        records
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out
}

fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Utc::now().year()
}

pub(crate) fn extract_year(text: &str) -> Option<i32> {
    YEAR.captures(text).and_then(|c| c[1].parse().ok())
}

fn extract_quarter(text: &str) -> Option<String> {
    QUARTER.captures(text).map(|c| format!("Q{}", &c[1]))
}

fn period_label(year: i32, quarter: Option<&str>) -> String {
    match quarter {
        Some(q) => format!("{year}-{q}"),
        None => year.to_string(),
    }
}

fn extract_population(text: &str) -> Option<i64> {
    for pattern in POPULATION_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            let matched = caps.get(1).unwrap();
            let raw = matched.as_str().replace(',', "");
            let Ok(value) = raw.parse::<f64>() else {
                continue;
            };

            let context = surrounding(text, matched.start(), matched.end(), 100).to_lowercase();
            let population = if context.contains("million") {
                (value * 1_000_000.0) as i64
            } else {
                value as i64
            };

            if (POPULATION_MIN..=POPULATION_MAX).contains(&population) {
                return Some(population);
            }
        }
    }
    None
}

fn extract_gdp_value(text: &str) -> Option<f64> {
    for pattern in GDP_VALUE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            let matched = caps.get(1).unwrap();
            let raw = matched.as_str().replace(',', "");
            let Ok(value) = raw.parse::<f64>() else {
                continue;
            };

            let context = surrounding(text, matched.start(), matched.end(), 50).to_lowercase();
            let gdp = if context.contains("trillion") || context.contains(" tn") {
                value * 1_000_000_000_000.0
            } else if context.contains("billion") || context.contains(" bn") {
                value * 1_000_000_000.0
            } else if context.contains("million") {
                value * 1_000_000.0
            } else {
                value
            };

            if (GDP_MIN_KES..=GDP_MAX_KES).contains(&gdp) {
                return Some(gdp);
            }
        }
    }
    None
}

fn extract_gdp_growth(text: &str) -> Option<f64> {
    GDP_GROWTH
        .captures(text)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .filter(|rate| (GROWTH_MIN..=GROWTH_MAX).contains(rate))
}

fn first_bounded(patterns: &[Regex], text: &str, min: f64, max: f64) -> Option<f64> {
    for pattern in patterns {
        if let Some(caps) = pattern.captures(text) {
            if let Ok(value) = caps[1].parse::<f64>() {
                if (min..=max).contains(&value) {
                    return Some(value);
                }
            }
        }
    }
    None
}

fn surrounding(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let from = start.saturating_sub(radius);
    let to = (end + radius).min(text.len());
    // Clamp to char boundaries; collapse_whitespace keeps the text ASCII-ish
    // but titles can still carry unicode dashes.
    let from = (0..=from).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0);
    let to = (to..=text.len()).find(|&i| text.is_char_boundary(i)).unwrap_or(text.len());
    &text[from..to]
}

fn strip_gcp_prefix(label: &str) -> &str {
    let lower = label.to_lowercase();
    for prefix in ["gross county product", "gross value added", "gcp"] {
        if lower.starts_with(prefix) {
            if let Some(rest) = label.get(prefix.len()..) {
                return rest.trim_matches(|c: char| !c.is_alphanumeric());
            }
        }
    }
    label
}

fn parse_numeric(cell: &str) -> Option<f64> {
    let mut text = cell.trim().replace([',', ' '], "");
    text = text.replace('\u{2212}', "-").replace('\u{2013}', "-");
    let negative = text.starts_with('(') && text.ends_with(')');
    if negative {
        text = text[1..text.len() - 1].to_string();
    }
    if text.is_empty() || matches!(text.as_str(), "-" | "--" | "\u{2014}") {
        return None;
    }
    if !text.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse::<f64>().ok().map(|n| if negative { -n } else { n })
}

fn parse_integer(cell: &str) -> Option<i64> {
    parse_numeric(cell).map(|v| v as i64)
}

fn column_years(table: &ExtractedTable) -> std::collections::BTreeMap<usize, i32> {
    let mut map = std::collections::BTreeMap::new();

    let header_row = table.data.headers.iter().enumerate();
    let leading_rows = table.data.rows.iter().take(3);

    for (idx, cell) in header_row {
        if let Some(year) = extract_year(cell) {
            map.entry(idx).or_insert(year);
        }
    }
    for row in leading_rows {
        for (idx, cell) in row.iter().enumerate() {
            if let Some(year) = extract_year(cell) {
                map.entry(idx).or_insert(year);
            }
        }
    }
    map
}
