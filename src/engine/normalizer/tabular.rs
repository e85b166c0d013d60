use std::collections::HashMap;
use tracing::{debug, warn};

use crate::domain::record::BudgetLineRecord;
use crate::domain::{EntityInfo, EntityType, ParsedRecord, Provenance};
use crate::engine::extractor::{ExtractedTable, Extraction};

use super::Normalizer;

/// Roles a table column can play in a budget table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Role {
    Entity,
    Allocated,
    Actual,
    Category,
    Period,
}

pub(super) fn normalize_tables(
    normalizer: &Normalizer,
    extraction: &Extraction,
    source_key: &str,
    _doc_type: &str,
) -> Vec<ParsedRecord> {
    if extraction.tables.is_empty() {
        warn!(source_key, "no tables found in extraction result");
        return Vec::new();
    }

    let mut records = Vec::new();
    for table in &extraction.tables {
        records.extend(normalize_table(normalizer, table, &extraction.extraction_date));
    }

    debug!(
        source_key,
        count = records.len(),
        "normalized tabular records"
    );
    records
}

fn normalize_table(
    normalizer: &Normalizer,
    table: &ExtractedTable,
    extraction_date: &str,
) -> Vec<ParsedRecord> {
    let headers = &table.data.headers;
    let rows = &table.data.rows;
    if headers.is_empty() || rows.is_empty() {
        return Vec::new();
    }

    let roles = identify_columns(headers);
    let mut records = Vec::new();

    for (row_index, row) in rows.iter().enumerate() {
        // Malformed rows (arity mismatch) are skipped, not repaired.
        if row.len() != headers.len() {
            continue;
        }
        if let Some(record) =
            normalize_row(normalizer, row, &roles, table, row_index, extraction_date)
        {
            records.push(record);
        }
    }

    records
}

fn identify_columns(headers: &[String]) -> HashMap<Role, usize> {
    let mut roles = HashMap::new();

    for (index, header) in headers.iter().enumerate() {
        let h = header.to_lowercase();
        let role = if ["entity", "department", "ministry", "county", "agency"]
            .iter()
            .any(|k| h.contains(k))
            || ["name", "description", "item"].iter().any(|k| h.contains(k))
        {
            Some(Role::Entity)
        } else if ["allocation", "budget", "approved"].iter().any(|k| h.contains(k)) {
            Some(Role::Allocated)
        } else if ["actual", "spent", "expenditure", "disbursed"]
            .iter()
            .any(|k| h.contains(k))
        {
            Some(Role::Actual)
        } else if ["category", "programme", "sector"].iter().any(|k| h.contains(k)) {
            Some(Role::Category)
        } else if ["year", "period", "fy"].iter().any(|k| h.contains(k)) {
            Some(Role::Period)
        } else {
            None
        };

        if let Some(role) = role {
            roles.entry(role).or_insert(index);
        }
    }

    roles
}

fn normalize_row(
    normalizer: &Normalizer,
    row: &[String],
    roles: &HashMap<Role, usize>,
    table: &ExtractedTable,
    row_index: usize,
    extraction_date: &str,
) -> Option<ParsedRecord> {
    let entity = roles.get(&Role::Entity).map(|&i| {
        let raw = row[i].trim();
        normalizer.normalize_entity_name(raw).unwrap_or_else(|| {
            // Unmapped names are kept verbatim at floor confidence so the
            // loader can still create the entity.
            EntityInfo::new(raw, EntityType::Agency)
                .with_confidence(0.1)
                .with_raw_name(raw)
        })
    })?;

    let allocated = roles
        .get(&Role::Allocated)
        .and_then(|&i| normalizer.normalize_amount(row[i].trim(), ""));
    let actual = roles
        .get(&Role::Actual)
        .and_then(|&i| normalizer.normalize_amount(row[i].trim(), ""));

    // A budget line needs an entity and at least one amount.
    if allocated.is_none() && actual.is_none() {
        return None;
    }

    let category = roles
        .get(&Role::Category)
        .map(|&i| row[i].trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let fiscal_period = roles
        .get(&Role::Period)
        .and_then(|&i| normalizer.normalize_fiscal_period(row[i].trim()));

    let mut provenance = Provenance::for_table(table.page, table.table_index, row_index, 0.7);
    provenance.extraction_date = Some(extraction_date.to_string());

    Some(ParsedRecord::BudgetLine(BudgetLineRecord {
        entity,
        fiscal_period,
        category,
        subcategory: None,
        allocated_amount: allocated,
        actual_amount: actual,
        committed_amount: None,
        provenance,
    }))
}
