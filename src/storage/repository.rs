//! Idempotent loader. Every write path goes through find-or-create helpers,
//! each document is one transaction, and re-ingesting the same document
//! converges instead of duplicating fact rows. This module is the only
//! place that touches the database on the write side.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, error, info, warn};

use crate::domain::record::{
    AuditFindingRecord, BudgetLineRecord, GdpRecord, IndicatorRecord, PopulationRecord,
    PovertyRecord,
};
use crate::domain::{
    Country, DebtCategory, DocumentRecord, DocumentStatus, EntityInfo, IngestionJob,
    NormalizedPeriod, ParsedRecord, Provenance, Result,
};
use crate::engine::extractor::Extraction;

/// Per-document load result.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOutcome {
    pub document_id: i64,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
}

enum RecordOutcome {
    Created,
    Updated,
    Skipped,
}

/// Seed input for the loans table.
#[derive(Debug, Clone)]
pub struct LoanInput {
    pub entity: EntityInfo,
    pub lender: String,
    pub debt_category: DebtCategory,
    pub principal: Decimal,
    pub outstanding: Decimal,
    pub interest_rate: Option<Decimal>,
    pub issue_date: NaiveDate,
    pub maturity_date: Option<NaiveDate>,
    pub currency: String,
}

#[derive(Clone)]
pub struct Loader {
    pool: SqlitePool,
}

impl Loader {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Find-or-create the Kenya country row; returns its id.
    pub async fn ensure_country(&self) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        ensure_country(&mut conn).await
    }

    pub async fn ensure_entity(&self, info: &EntityInfo) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        let country_id = ensure_country(&mut conn).await?;
        ensure_entity(&mut conn, info, country_id).await
    }

    pub async fn ensure_fiscal_period(&self, period: &NormalizedPeriod) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        let country_id = ensure_country(&mut conn).await?;
        ensure_fiscal_period(&mut conn, period, country_id).await
    }

    /// Persist one document and its records atomically. The transaction is
    /// rolled back and the error re-raised if any record write fails.
    pub async fn load_document(
        &self,
        document: &DocumentRecord,
        records: &[ParsedRecord],
    ) -> Result<LoadOutcome> {
        let mut tx: Transaction<'_, Sqlite> = self.pool.begin().await?;

        let result = load_document_tx(&mut tx, document, records).await;
        match result {
            Ok(outcome) => {
                tx.commit().await?;
                info!(
                    document_id = outcome.document_id,
                    created = outcome.created,
                    updated = outcome.updated,
                    skipped = outcome.skipped,
                    title = %document.title,
                    "document loaded"
                );
                Ok(outcome)
            }
            Err(err) => {
                error!(title = %document.title, error = %err, "document load failed, rolling back");
                // Dropping the transaction rolls it back; re-raise for the
                // orchestrator to record.
                Err(err)
            }
        }
    }

    /// Store the raw extractor output alongside the document.
    pub async fn record_extraction(&self, document_id: i64, extraction: &Extraction) -> Result<()> {
        sqlx::query(
            "INSERT INTO extractions (source_document_id, extracted_json, extractor, confidence)
             VALUES (?, ?, ?, ?)",
        )
        .bind(document_id)
        .bind(serde_json::to_string(extraction)?)
        .bind(&extraction.extractor_name)
        .bind(extraction.confidence)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_document_status(
        &self,
        document_id: i64,
        status: DocumentStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE source_documents SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_job(&self, job: &IngestionJob) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO ingestion_jobs
             (id, domain, status, dry_run, records_processed, records_created,
              records_updated, errors, started_at, finished_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(job.id.to_string())
        .bind(&job.domain)
        .bind(job.status.as_str())
        .bind(job.dry_run as i64)
        .bind(job.records_processed as i64)
        .bind(job.records_created as i64)
        .bind(job.records_updated as i64)
        .bind(serde_json::to_string(&job.errors)?)
        .bind(job.started_at.to_rfc3339())
        .bind(job.finished_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert on `(entity, lender, issue_date)`: value columns refresh,
    /// provenance stays.
    pub async fn upsert_loan(&self, source_document_id: i64, loan: &LoanInput) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let country_id = ensure_country(&mut conn).await?;
        let entity_id = ensure_entity(&mut conn, &loan.entity, country_id).await?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM loans WHERE entity_id = ? AND lender = ? AND issue_date = ?",
        )
        .bind(entity_id)
        .bind(&loan.lender)
        .bind(loan.issue_date.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(id) = existing {
            sqlx::query(
                "UPDATE loans SET principal = ?, outstanding = ?, interest_rate = ?,
                        maturity_date = ?, debt_category = ?, currency = ?,
                        updated_at = datetime('now')
                 WHERE id = ?",
            )
            .bind(money_str(loan.principal))
            .bind(money_str(loan.outstanding))
            .bind(loan.interest_rate.map(money_str))
            .bind(loan.maturity_date.map(|d| d.to_string()))
            .bind(loan.debt_category.as_str())
            .bind(&loan.currency)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        } else {
            sqlx::query(
                "INSERT INTO loans (entity_id, lender, debt_category, principal, outstanding,
                        interest_rate, issue_date, maturity_date, currency,
                        source_document_id, provenance)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(entity_id)
            .bind(&loan.lender)
            .bind(loan.debt_category.as_str())
            .bind(money_str(loan.principal))
            .bind(money_str(loan.outstanding))
            .bind(loan.interest_rate.map(money_str))
            .bind(loan.issue_date.to_string())
            .bind(loan.maturity_date.map(|d| d.to_string()))
            .bind(&loan.currency)
            .bind(source_document_id)
            .bind(provenance_json(source_document_id, &Provenance::default())?)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    pub async fn upsert_debt_timeline(
        &self,
        year: i32,
        external: Option<Decimal>,
        domestic: Option<Decimal>,
    ) -> Result<()> {
        let total = match (external, domestic) {
            (Some(e), Some(d)) => Some(e + d),
            (Some(e), None) => Some(e),
            (None, Some(d)) => Some(d),
            (None, None) => None,
        };
        sqlx::query(
            "INSERT INTO debt_timelines (year, external_debt, domestic_debt, total_debt)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(year) DO UPDATE SET
                external_debt = excluded.external_debt,
                domestic_debt = excluded.domestic_debt,
                total_debt = excluded.total_debt",
        )
        .bind(year)
        .bind(external.map(money_str))
        .bind(domestic.map(money_str))
        .bind(total.map(money_str))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_fiscal_summary(
        &self,
        fiscal_year: &str,
        revenue: Option<Decimal>,
        expenditure: Option<Decimal>,
    ) -> Result<()> {
        let deficit = match (revenue, expenditure) {
            (Some(r), Some(e)) => Some(e - r),
            _ => None,
        };
        sqlx::query(
            "INSERT INTO fiscal_summaries (fiscal_year, total_revenue, total_expenditure, deficit)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(fiscal_year) DO UPDATE SET
                total_revenue = excluded.total_revenue,
                total_expenditure = excluded.total_expenditure,
                deficit = excluded.deficit",
        )
        .bind(fiscal_year)
        .bind(revenue.map(money_str))
        .bind(expenditure.map(money_str))
        .bind(deficit.map(money_str))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_revenue_source(
        &self,
        fiscal_year: &str,
        revenue_source: &str,
        amount: Option<Decimal>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO revenue_by_source (fiscal_year, revenue_source, amount)
             VALUES (?, ?, ?)
             ON CONFLICT(fiscal_year, revenue_source) DO UPDATE SET
                amount = excluded.amount",
        )
        .bind(fiscal_year)
        .bind(revenue_source)
        .bind(amount.map(money_str))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

async fn load_document_tx(
    tx: &mut Transaction<'_, Sqlite>,
    document: &DocumentRecord,
    records: &[ParsedRecord],
) -> Result<LoadOutcome> {
    let country_id = ensure_country(tx).await?;
    let document_id = find_or_create_document(tx, document, country_id).await?;

    let mut outcome = LoadOutcome {
        document_id,
        ..Default::default()
    };

    for record in records {
        let record_outcome = match record {
            ParsedRecord::BudgetLine(r) => {
                load_budget_line(tx, r, document_id, country_id, document).await?
            }
            ParsedRecord::AuditFinding(r) => {
                load_audit_finding(tx, r, document_id, country_id, document).await?
            }
            ParsedRecord::PopulationData(r) => {
                load_population(tx, r, document_id, country_id).await?
            }
            ParsedRecord::GdpData(r) => load_gdp(tx, r, document_id, country_id).await?,
            ParsedRecord::EconomicIndicator(r) => {
                load_indicator(tx, r, document_id, country_id, document).await?
            }
            ParsedRecord::PovertyIndex(r) => {
                load_poverty(tx, r, document_id, country_id).await?
            }
        };
        match record_outcome {
            RecordOutcome::Created => outcome.created += 1,
            RecordOutcome::Updated => outcome.updated += 1,
            RecordOutcome::Skipped => outcome.skipped += 1,
        }
    }

    Ok(outcome)
}

async fn ensure_country(conn: &mut SqliteConnection) -> Result<i64> {
    let defaults = Country::kenya_defaults();

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM countries WHERE iso_code = ?")
        .bind(&defaults.iso_code)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = sqlx::query(
        "INSERT INTO countries (iso_code, name, currency, timezone, default_locale, metadata)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&defaults.iso_code)
    .bind(&defaults.name)
    .bind(&defaults.currency)
    .bind(&defaults.timezone)
    .bind(&defaults.default_locale)
    .bind(defaults.metadata.to_string())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    info!(iso_code = %defaults.iso_code, "created country record");
    Ok(id)
}

async fn ensure_entity(
    conn: &mut SqliteConnection,
    info: &EntityInfo,
    country_id: i64,
) -> Result<i64> {
    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM entities WHERE canonical_name = ? AND country_id = ?")
            .bind(&info.canonical_name)
            .bind(country_id)
            .fetch_optional(&mut *conn)
            .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let alt_names: Vec<&str> = info
        .raw_name
        .as_deref()
        .filter(|raw| !raw.trim().is_empty() && *raw != info.canonical_name)
        .into_iter()
        .collect();
    let metadata = serde_json::json!({
        "confidence": info.confidence,
        "category": info.category.as_deref().unwrap_or("unknown"),
    });

    let id = sqlx::query(
        "INSERT INTO entities (country_id, entity_type, canonical_name, slug, alt_names, metadata)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(country_id)
    .bind(info.entity_type.as_str())
    .bind(&info.canonical_name)
    .bind(info.slug())
    .bind(serde_json::to_string(&alt_names)?)
    .bind(metadata.to_string())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    debug!(entity = %info.canonical_name, "created entity");
    Ok(id)
}

async fn ensure_fiscal_period(
    conn: &mut SqliteConnection,
    period: &NormalizedPeriod,
    country_id: i64,
) -> Result<i64> {
    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM fiscal_periods WHERE label = ? AND country_id = ?")
            .bind(&period.label)
            .bind(country_id)
            .fetch_optional(&mut *conn)
            .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = sqlx::query(
        "INSERT INTO fiscal_periods (country_id, label, start_date, end_date) VALUES (?, ?, ?, ?)",
    )
    .bind(country_id)
    .bind(&period.label)
    .bind(period.start_date.to_string())
    .bind(period.end_date.to_string())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    debug!(label = %period.label, "created fiscal period");
    Ok(id)
}

/// SourceDocument lookup by md5 first, then url; reuse bumps `last_seen_at`.
async fn find_or_create_document(
    tx: &mut Transaction<'_, Sqlite>,
    document: &DocumentRecord,
    country_id: i64,
) -> Result<i64> {
    let mut existing: Option<i64> = None;
    if let Some(md5) = &document.md5 {
        existing = sqlx::query_scalar("SELECT id FROM source_documents WHERE md5 = ?")
            .bind(md5)
            .fetch_optional(&mut **tx)
            .await?;
    }
    if existing.is_none() {
        existing = sqlx::query_scalar("SELECT id FROM source_documents WHERE url = ?")
            .bind(&document.url)
            .fetch_optional(&mut **tx)
            .await?;
    }

    if let Some(id) = existing {
        sqlx::query("UPDATE source_documents SET last_seen_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&mut **tx)
            .await?;
        debug!(document_id = id, "reusing existing document record");
        return Ok(id);
    }

    let id = sqlx::query(
        "INSERT INTO source_documents
         (country_id, publisher, source_key, title, url, file_path, fetch_date, md5,
          doc_type, status, last_seen_at, metadata)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(country_id)
    .bind(&document.publisher)
    .bind(&document.source_key)
    .bind(&document.title)
    .bind(&document.url)
    .bind(&document.file_path)
    .bind(document.fetch_date.to_rfc3339())
    .bind(&document.md5)
    .bind(document.doc_type.as_str())
    .bind(DocumentStatus::Available.as_str())
    .bind(Utc::now().to_rfc3339())
    .bind(document.metadata.to_string())
    .execute(&mut **tx)
    .await?
    .last_insert_rowid();

    debug!(document_id = id, title = %document.title, "created document record");
    Ok(id)
}

/// Fiscal period covering the fetch date, used when a record carries none.
fn fallback_period(fetch_date: DateTime<Utc>) -> NormalizedPeriod {
    let date = fetch_date.date_naive();
    let start_year = if date.month() >= 7 {
        date.year()
    } else {
        date.year() - 1
    };
    NormalizedPeriod::fiscal_year(start_year).with_confidence(0.3)
}

/// Canonical decimal string with two fractional digits.
fn money_str(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

fn provenance_json(source_document_id: i64, provenance: &Provenance) -> Result<String> {
    let mut value = serde_json::to_value(provenance)?;
    if let Some(object) = value.as_object_mut() {
        object.insert(
            "source_document_id".to_string(),
            serde_json::json!(source_document_id),
        );
    }
    Ok(serde_json::to_string(&vec![value])?)
}

async fn load_budget_line(
    tx: &mut Transaction<'_, Sqlite>,
    record: &BudgetLineRecord,
    document_id: i64,
    country_id: i64,
    document: &DocumentRecord,
) -> Result<RecordOutcome> {
    if record.allocated_amount.is_none() && record.actual_amount.is_none() {
        debug!("budget line without amounts, skipping");
        return Ok(RecordOutcome::Skipped);
    }

    let entity_id = ensure_entity(tx, &record.entity, country_id).await?;
    let period = record
        .fiscal_period
        .clone()
        .unwrap_or_else(|| fallback_period(document.fetch_date));
    let period_id = ensure_fiscal_period(tx, &period, country_id).await?;

    let allocated = record
        .allocated_amount
        .as_ref()
        .map(|a| money_str(a.base_amount));
    let actual = record
        .actual_amount
        .as_ref()
        .map(|a| money_str(a.base_amount));
    let committed = record
        .committed_amount
        .as_ref()
        .map(|a| money_str(a.base_amount));

    // Narrow probe: the natural key plus this document and these values.
    let duplicate: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM budget_lines
         WHERE entity_id = ? AND period_id = ? AND source_document_id = ?
           AND category = ? AND subcategory IS ?
           AND allocated_amount IS ? AND actual_spent IS ?",
    )
    .bind(entity_id)
    .bind(period_id)
    .bind(document_id)
    .bind(&record.category)
    .bind(&record.subcategory)
    .bind(&allocated)
    .bind(&actual)
    .fetch_optional(&mut **tx)
    .await?;
    if duplicate.is_some() {
        return Ok(RecordOutcome::Skipped);
    }

    // Unique-key collision takes the update path for value columns only.
    let conflict: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM budget_lines
         WHERE entity_id = ? AND period_id = ? AND category = ? AND subcategory IS ?",
    )
    .bind(entity_id)
    .bind(period_id)
    .bind(&record.category)
    .bind(&record.subcategory)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(id) = conflict {
        sqlx::query(
            "UPDATE budget_lines
             SET allocated_amount = ?, actual_spent = ?, committed_amount = ?, currency = ?
             WHERE id = ?",
        )
        .bind(&allocated)
        .bind(&actual)
        .bind(&committed)
        .bind("KES")
        .bind(id)
        .execute(&mut **tx)
        .await?;
        return Ok(RecordOutcome::Updated);
    }

    sqlx::query(
        "INSERT INTO budget_lines
         (entity_id, period_id, category, subcategory, allocated_amount, actual_spent,
          committed_amount, currency, source_document_id, page_ref, notes, provenance)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entity_id)
    .bind(period_id)
    .bind(&record.category)
    .bind(&record.subcategory)
    .bind(&allocated)
    .bind(&actual)
    .bind(&committed)
    .bind("KES")
    .bind(document_id)
    .bind(record.provenance.page.map(|p| p.to_string()))
    .bind(
        record
            .provenance
            .table_index
            .map(|t| format!("Extracted from table {t}")),
    )
    .bind(provenance_json(document_id, &record.provenance)?)
    .execute(&mut **tx)
    .await?;

    Ok(RecordOutcome::Created)
}

async fn load_audit_finding(
    tx: &mut Transaction<'_, Sqlite>,
    record: &AuditFindingRecord,
    document_id: i64,
    country_id: i64,
    document: &DocumentRecord,
) -> Result<RecordOutcome> {
    let entity = record.entity.clone().unwrap_or_else(|| {
        EntityInfo::new("Unknown Entity", crate::domain::EntityType::Agency).with_confidence(0.0)
    });
    let entity_id = ensure_entity(tx, &entity, country_id).await?;

    let period = record
        .fiscal_period
        .clone()
        .unwrap_or_else(|| fallback_period(document.fetch_date));
    let period_id = ensure_fiscal_period(tx, &period, country_id).await?;

    let duplicate: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM audits
         WHERE entity_id = ? AND period_id = ? AND source_document_id = ? AND finding_text = ?",
    )
    .bind(entity_id)
    .bind(period_id)
    .bind(document_id)
    .bind(&record.finding_text)
    .fetch_optional(&mut **tx)
    .await?;
    if duplicate.is_some() {
        return Ok(RecordOutcome::Skipped);
    }

    sqlx::query(
        "INSERT INTO audits
         (entity_id, period_id, finding_text, severity, recommended_action,
          source_document_id, provenance)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entity_id)
    .bind(period_id)
    .bind(&record.finding_text)
    .bind(record.severity.as_str())
    .bind(&record.recommended_action)
    .bind(document_id)
    .bind(provenance_json(document_id, &record.provenance)?)
    .execute(&mut **tx)
    .await?;

    Ok(RecordOutcome::Created)
}

async fn load_population(
    tx: &mut Transaction<'_, Sqlite>,
    record: &PopulationRecord,
    document_id: i64,
    country_id: i64,
) -> Result<RecordOutcome> {
    if record.total_population <= 0 {
        debug!("population record with missing/zero total, skipping");
        return Ok(RecordOutcome::Skipped);
    }

    let entity = record.entity.clone().unwrap_or_else(EntityInfo::national);
    let entity_id = ensure_entity(tx, &entity, country_id).await?;

    let duplicate: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM population_data
         WHERE entity_id = ? AND year = ? AND source_document_id = ?",
    )
    .bind(entity_id)
    .bind(record.year)
    .bind(document_id)
    .fetch_optional(&mut **tx)
    .await?;
    if duplicate.is_some() {
        return Ok(RecordOutcome::Skipped);
    }

    let conflict: Option<i64> =
        sqlx::query_scalar("SELECT id FROM population_data WHERE entity_id = ? AND year = ?")
            .bind(entity_id)
            .bind(record.year)
            .fetch_optional(&mut **tx)
            .await?;

    if let Some(id) = conflict {
        sqlx::query(
            "UPDATE population_data
             SET total_population = ?, male_population = ?, female_population = ?,
                 urban_population = ?, rural_population = ?, population_density = ?,
                 confidence = ?
             WHERE id = ?",
        )
        .bind(record.total_population)
        .bind(record.male_population)
        .bind(record.female_population)
        .bind(record.urban_population)
        .bind(record.rural_population)
        .bind(record.population_density)
        .bind(record.provenance.confidence)
        .bind(id)
        .execute(&mut **tx)
        .await?;
        return Ok(RecordOutcome::Updated);
    }

    sqlx::query(
        "INSERT INTO population_data
         (entity_id, year, total_population, male_population, female_population,
          urban_population, rural_population, population_density, source_document_id,
          source_page, confidence)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entity_id)
    .bind(record.year)
    .bind(record.total_population)
    .bind(record.male_population)
    .bind(record.female_population)
    .bind(record.urban_population)
    .bind(record.rural_population)
    .bind(record.population_density)
    .bind(document_id)
    .bind(record.provenance.page.map(|p| p as i64))
    .bind(record.provenance.confidence)
    .execute(&mut **tx)
    .await?;

    Ok(RecordOutcome::Created)
}

async fn load_gdp(
    tx: &mut Transaction<'_, Sqlite>,
    record: &GdpRecord,
    document_id: i64,
    country_id: i64,
) -> Result<RecordOutcome> {
    if record.gdp_value <= 0.0 {
        debug!("gdp record with missing/zero value, skipping");
        return Ok(RecordOutcome::Skipped);
    }

    let entity = record.entity.clone().unwrap_or_else(EntityInfo::national);
    let entity_id = ensure_entity(tx, &entity, country_id).await?;

    let duplicate: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM gdp_data
         WHERE entity_id = ? AND year = ? AND quarter IS ? AND source_document_id = ?",
    )
    .bind(entity_id)
    .bind(record.year)
    .bind(&record.quarter)
    .bind(document_id)
    .fetch_optional(&mut **tx)
    .await?;
    if duplicate.is_some() {
        return Ok(RecordOutcome::Skipped);
    }

    let conflict: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM gdp_data WHERE entity_id = ? AND year = ? AND quarter IS ?",
    )
    .bind(entity_id)
    .bind(record.year)
    .bind(&record.quarter)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(id) = conflict {
        sqlx::query(
            "UPDATE gdp_data
             SET gdp_value = ?, gdp_growth_rate = ?, currency = ?, confidence = ?
             WHERE id = ?",
        )
        .bind(record.gdp_value)
        .bind(record.growth_rate)
        .bind(&record.currency)
        .bind(record.provenance.confidence)
        .bind(id)
        .execute(&mut **tx)
        .await?;
        return Ok(RecordOutcome::Updated);
    }

    sqlx::query(
        "INSERT INTO gdp_data
         (entity_id, year, quarter, gdp_value, gdp_growth_rate, currency,
          source_document_id, source_page, confidence)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entity_id)
    .bind(record.year)
    .bind(&record.quarter)
    .bind(record.gdp_value)
    .bind(record.growth_rate)
    .bind(&record.currency)
    .bind(document_id)
    .bind(record.provenance.page.map(|p| p as i64))
    .bind(record.provenance.confidence)
    .execute(&mut **tx)
    .await?;

    Ok(RecordOutcome::Created)
}

async fn load_indicator(
    tx: &mut Transaction<'_, Sqlite>,
    record: &IndicatorRecord,
    document_id: i64,
    country_id: i64,
    document: &DocumentRecord,
) -> Result<RecordOutcome> {
    if record.indicator_type.trim().is_empty() || record.period.trim().is_empty() {
        debug!("indicator missing type/period, skipping");
        return Ok(RecordOutcome::Skipped);
    }
    if record.value == 0.0 {
        debug!("indicator with zero value and no context, skipping");
        return Ok(RecordOutcome::Skipped);
    }

    let indicator_date = parse_period_to_date(&record.period, document.fetch_date);
    let entity = record.entity.clone().unwrap_or_else(EntityInfo::national);
    let entity_id = ensure_entity(tx, &entity, country_id).await?;

    let duplicate: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM economic_indicators
         WHERE indicator_type = ? AND indicator_date = ? AND entity_id = ?
           AND source_document_id = ?",
    )
    .bind(&record.indicator_type)
    .bind(indicator_date.to_string())
    .bind(entity_id)
    .bind(document_id)
    .fetch_optional(&mut **tx)
    .await?;
    if duplicate.is_some() {
        return Ok(RecordOutcome::Skipped);
    }

    let conflict: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM economic_indicators
         WHERE indicator_type = ? AND indicator_date = ? AND entity_id = ?",
    )
    .bind(&record.indicator_type)
    .bind(indicator_date.to_string())
    .bind(entity_id)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(id) = conflict {
        sqlx::query("UPDATE economic_indicators SET value = ?, unit = ?, confidence = ? WHERE id = ?")
            .bind(record.value)
            .bind(&record.unit)
            .bind(record.provenance.confidence)
            .bind(id)
            .execute(&mut **tx)
            .await?;
        return Ok(RecordOutcome::Updated);
    }

    sqlx::query(
        "INSERT INTO economic_indicators
         (indicator_type, indicator_date, value, unit, entity_id, source_document_id,
          source_page, confidence)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.indicator_type)
    .bind(indicator_date.to_string())
    .bind(record.value)
    .bind(&record.unit)
    .bind(entity_id)
    .bind(document_id)
    .bind(record.provenance.page.map(|p| p as i64))
    .bind(record.provenance.confidence)
    .execute(&mut **tx)
    .await?;

    Ok(RecordOutcome::Created)
}

async fn load_poverty(
    tx: &mut Transaction<'_, Sqlite>,
    record: &PovertyRecord,
    document_id: i64,
    country_id: i64,
) -> Result<RecordOutcome> {
    if !(0.0..=100.0).contains(&record.poverty_rate) {
        warn!(rate = record.poverty_rate, "poverty rate out of range, skipping");
        return Ok(RecordOutcome::Skipped);
    }

    let entity = record.entity.clone().unwrap_or_else(EntityInfo::national);
    let entity_id = ensure_entity(tx, &entity, country_id).await?;

    let duplicate: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM poverty_indices
         WHERE entity_id = ? AND year = ? AND source_document_id = ?",
    )
    .bind(entity_id)
    .bind(record.year)
    .bind(document_id)
    .fetch_optional(&mut **tx)
    .await?;
    if duplicate.is_some() {
        return Ok(RecordOutcome::Skipped);
    }

    let conflict: Option<i64> =
        sqlx::query_scalar("SELECT id FROM poverty_indices WHERE entity_id = ? AND year = ?")
            .bind(entity_id)
            .bind(record.year)
            .fetch_optional(&mut **tx)
            .await?;

    if let Some(id) = conflict {
        sqlx::query(
            "UPDATE poverty_indices SET poverty_rate = ?, poverty_gap = ?, confidence = ?
             WHERE id = ?",
        )
        .bind(record.poverty_rate)
        .bind(record.poverty_gap)
        .bind(record.provenance.confidence)
        .bind(id)
        .execute(&mut **tx)
        .await?;
        return Ok(RecordOutcome::Updated);
    }

    sqlx::query(
        "INSERT INTO poverty_indices
         (entity_id, year, poverty_rate, poverty_gap, source_document_id, confidence)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(entity_id)
    .bind(record.year)
    .bind(record.poverty_rate)
    .bind(record.poverty_gap)
    .bind(document_id)
    .bind(record.provenance.confidence)
    .execute(&mut **tx)
    .await?;

    Ok(RecordOutcome::Created)
}

/// `2025-05`, `2025-Q2` and `2025` period labels to a representative date.
fn parse_period_to_date(period: &str, fallback: DateTime<Utc>) -> NaiveDate {
    let p = period.trim();

    if let Some((year, rest)) = p.split_once('-') {
        if let Ok(year) = year.parse::<i32>() {
            let rest = rest.trim();
            if let Some(quarter) = rest
                .strip_prefix(['Q', 'q'])
                .and_then(|q| q.parse::<u32>().ok())
                .filter(|q| (1..=4).contains(q))
            {
                let month = (quarter - 1) * 3 + 1;
                if let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) {
                    return date;
                }
            }
            if let Ok(month) = rest.parse::<u32>() {
                if let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) {
                    return date;
                }
            }
        }
    }
    if let Ok(year) = p.parse::<i32>() {
        if let Some(date) = NaiveDate::from_ymd_opt(year, 1, 1) {
            return date;
        }
    }

    NaiveDate::from_ymd_opt(fallback.year(), 1, 1).unwrap_or(fallback.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_period_labels() {
        let fallback = Utc::now();
        assert_eq!(
            parse_period_to_date("2025-05", fallback),
            NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()
        );
        assert_eq!(
            parse_period_to_date("2025-Q2", fallback),
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
        );
        assert_eq!(
            parse_period_to_date("2025", fallback),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_fallback_period_spans_fiscal_year() {
        let july = DateTime::parse_from_rfc3339("2024-08-15T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(fallback_period(july).label, "FY2024/25");

        let march = DateTime::parse_from_rfc3339("2025-03-15T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(fallback_period(march).label, "FY2024/25");
    }
}
