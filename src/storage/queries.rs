//! Read-side query contract consumed by the HTTP layer. The API framing
//! lives elsewhere; these are the aggregates and filters it depends on.

use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::domain::Result;

use super::models::{
    AuditRow, BudgetLineRow, GdpRow, IndicatorRow, PopulationRow, PovertyRow, SourceDocumentRow,
};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EntitySummary {
    pub id: i64,
    pub canonical_name: String,
    pub slug: String,
    pub entity_type: String,
    pub allocated_sum: f64,
    pub spent_sum: f64,
    pub execution_rate: f64,
    pub audit_count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PeriodAggregate {
    pub period_label: String,
    pub allocated_sum: f64,
    pub spent_sum: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityDetail {
    pub id: i64,
    pub canonical_name: String,
    pub slug: String,
    pub entity_type: String,
    pub periods: Vec<PeriodAggregate>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SourceStatus {
    pub source_key: String,
    pub document_count: i64,
    pub last_fetch: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageStatus {
    pub total_documents: i64,
    pub mirrored_documents: i64,
    pub failed_documents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedDocument {
    pub original_url: Option<String>,
    pub mirror_key: Option<String>,
    pub local_path: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataSummary {
    pub countries: i64,
    pub entities: i64,
    pub fiscal_periods: i64,
    pub source_documents: i64,
    pub budget_lines: i64,
    pub audits: i64,
    pub population_rows: i64,
    pub gdp_rows: i64,
    pub indicator_rows: i64,
    pub latest_document: Option<LatestDocument>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LatestDocument {
    pub title: String,
    pub publisher: String,
    pub fetch_date: String,
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilters {
    pub entity_id: Option<i64>,
    pub year: Option<i32>,
    pub severity: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EconomicFilters {
    pub entity_id: Option<i64>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub min_confidence: Option<f64>,
}

#[derive(Clone)]
pub struct Queries {
    pool: SqlitePool,
}

impl Queries {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Entities with budget/audit aggregates, optionally filtered by type or
    /// a name search.
    pub async fn list_entities(
        &self,
        entity_type: Option<&str>,
        search: Option<&str>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<EntitySummary>> {
        let offset = (page.max(1) - 1) * limit;
        let search_pattern = search.map(|s| format!("%{s}%"));

        let rows = sqlx::query_as::<_, EntitySummary>(
            "SELECT e.id, e.canonical_name, e.slug, e.entity_type,
                    COALESCE(SUM(CAST(b.allocated_amount AS REAL)), 0.0) AS allocated_sum,
                    COALESCE(SUM(CAST(b.actual_spent AS REAL)), 0.0) AS spent_sum,
                    CASE WHEN COALESCE(SUM(CAST(b.allocated_amount AS REAL)), 0.0) > 0
                         THEN COALESCE(SUM(CAST(b.actual_spent AS REAL)), 0.0)
                              / SUM(CAST(b.allocated_amount AS REAL))
                         ELSE 0.0 END AS execution_rate,
                    (SELECT COUNT(*) FROM audits a WHERE a.entity_id = e.id) AS audit_count
             FROM entities e
             LEFT JOIN budget_lines b ON b.entity_id = e.id
             WHERE (?1 IS NULL OR e.entity_type = ?1)
               AND (?2 IS NULL OR e.canonical_name LIKE ?2)
             GROUP BY e.id
             ORDER BY e.canonical_name
             LIMIT ?3 OFFSET ?4",
        )
        .bind(entity_type)
        .bind(search_pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// One entity with its per-fiscal-period time series.
    pub async fn get_entity(&self, id: i64) -> Result<Option<EntityDetail>> {
        #[derive(FromRow)]
        struct Base {
            id: i64,
            canonical_name: String,
            slug: String,
            entity_type: String,
        }

        let Some(base) = sqlx::query_as::<_, Base>(
            "SELECT id, canonical_name, slug, entity_type FROM entities WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let periods = sqlx::query_as::<_, PeriodAggregate>(
            "SELECT p.label AS period_label,
                    COALESCE(SUM(CAST(b.allocated_amount AS REAL)), 0.0) AS allocated_sum,
                    COALESCE(SUM(CAST(b.actual_spent AS REAL)), 0.0) AS spent_sum
             FROM budget_lines b
             JOIN fiscal_periods p ON p.id = b.period_id
             WHERE b.entity_id = ?
             GROUP BY p.label
             ORDER BY p.label",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(EntityDetail {
            id: base.id,
            canonical_name: base.canonical_name,
            slug: base.slug,
            entity_type: base.entity_type,
            periods,
        }))
    }

    pub async fn list_budget_lines(
        &self,
        entity_id: i64,
        period_label: Option<&str>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<BudgetLineRow>> {
        let rows = sqlx::query_as::<_, BudgetLineRow>(
            "SELECT b.id, b.entity_id, b.period_id, b.category, b.subcategory,
                    b.allocated_amount, b.actual_spent, b.committed_amount, b.currency,
                    b.source_document_id, b.page_ref, b.notes, b.provenance
             FROM budget_lines b
             JOIN fiscal_periods p ON p.id = b.period_id
             WHERE b.entity_id = ?1
               AND (?2 IS NULL OR p.label = ?2)
             ORDER BY b.id
             LIMIT ?3 OFFSET ?4",
        )
        .bind(entity_id)
        .bind(period_label)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_audits(
        &self,
        filters: &AuditFilters,
        page: i64,
        limit: i64,
    ) -> Result<Vec<AuditRow>> {
        let offset = (page.max(1) - 1) * limit;
        let year_pattern = filters.year.map(|y| format!("FY{y}%"));

        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT a.id, a.entity_id, a.period_id, a.finding_text, a.severity,
                    a.recommended_action, a.source_document_id, a.provenance
             FROM audits a
             JOIN fiscal_periods p ON p.id = a.period_id
             WHERE (?1 IS NULL OR a.entity_id = ?1)
               AND (?2 IS NULL OR p.label LIKE ?2)
               AND (?3 IS NULL OR a.severity = ?3)
             ORDER BY a.id DESC
             LIMIT ?4 OFFSET ?5",
        )
        .bind(filters.entity_id)
        .bind(year_pattern)
        .bind(filters.severity.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_population(&self, filters: &EconomicFilters) -> Result<Vec<PopulationRow>> {
        let rows = sqlx::query_as::<_, PopulationRow>(
            "SELECT id, entity_id, year, total_population, male_population, female_population,
                    urban_population, rural_population, population_density,
                    source_document_id, confidence
             FROM population_data
             WHERE (?1 IS NULL OR entity_id = ?1)
               AND (?2 IS NULL OR year >= ?2)
               AND (?3 IS NULL OR year <= ?3)
               AND (?4 IS NULL OR confidence >= ?4)
             ORDER BY year",
        )
        .bind(filters.entity_id)
        .bind(filters.year_from)
        .bind(filters.year_to)
        .bind(filters.min_confidence)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_gdp(&self, filters: &EconomicFilters) -> Result<Vec<GdpRow>> {
        let rows = sqlx::query_as::<_, GdpRow>(
            "SELECT id, entity_id, year, quarter, gdp_value, gdp_growth_rate, currency,
                    source_document_id, confidence
             FROM gdp_data
             WHERE (?1 IS NULL OR entity_id = ?1)
               AND (?2 IS NULL OR year >= ?2)
               AND (?3 IS NULL OR year <= ?3)
               AND (?4 IS NULL OR confidence >= ?4)
             ORDER BY year, quarter",
        )
        .bind(filters.entity_id)
        .bind(filters.year_from)
        .bind(filters.year_to)
        .bind(filters.min_confidence)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_indicators(
        &self,
        indicator_type: Option<&str>,
        filters: &EconomicFilters,
    ) -> Result<Vec<IndicatorRow>> {
        let from = filters.year_from.map(|y| format!("{y}-01-01"));
        let to = filters.year_to.map(|y| format!("{y}-12-31"));

        let rows = sqlx::query_as::<_, IndicatorRow>(
            "SELECT id, indicator_type, indicator_date, value, unit, entity_id,
                    source_document_id, confidence
             FROM economic_indicators
             WHERE (?1 IS NULL OR indicator_type = ?1)
               AND (?2 IS NULL OR entity_id = ?2)
               AND (?3 IS NULL OR indicator_date >= ?3)
               AND (?4 IS NULL OR indicator_date <= ?4)
               AND (?5 IS NULL OR confidence >= ?5)
             ORDER BY indicator_date",
        )
        .bind(indicator_type)
        .bind(filters.entity_id)
        .bind(from)
        .bind(to)
        .bind(filters.min_confidence)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_poverty(&self, filters: &EconomicFilters) -> Result<Vec<PovertyRow>> {
        let rows = sqlx::query_as::<_, PovertyRow>(
            "SELECT id, entity_id, year, poverty_rate, poverty_gap, source_document_id, confidence
             FROM poverty_indices
             WHERE (?1 IS NULL OR entity_id = ?1)
               AND (?2 IS NULL OR year >= ?2)
               AND (?3 IS NULL OR year <= ?3)
               AND (?4 IS NULL OR confidence >= ?4)
             ORDER BY year",
        )
        .bind(filters.entity_id)
        .bind(filters.year_from)
        .bind(filters.year_to)
        .bind(filters.min_confidence)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Per-publisher document counts and last fetch time.
    pub async fn source_status(&self) -> Result<Vec<SourceStatus>> {
        let rows = sqlx::query_as::<_, SourceStatus>(
            "SELECT source_key, COUNT(*) AS document_count, MAX(fetch_date) AS last_fetch
             FROM source_documents
             GROUP BY source_key
             ORDER BY source_key",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Mirror coverage so operators can tell "not collected" from "failed".
    pub async fn storage_status(&self) -> Result<StorageStatus> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM source_documents")
            .fetch_one(&self.pool)
            .await?;
        let mirrored: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM source_documents
             WHERE json_extract(metadata, '$.mirror_key') IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        let failed: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM source_documents WHERE status = 'failed'")
                .fetch_one(&self.pool)
                .await?;

        Ok(StorageStatus {
            total_documents: total,
            mirrored_documents: mirrored,
            failed_documents: failed,
        })
    }

    pub async fn resolve_document(&self, url: &str) -> Result<Option<ResolvedDocument>> {
        let row = sqlx::query_as::<_, SourceDocumentRow>(
            "SELECT id, country_id, publisher, source_key, title, url, file_path, fetch_date,
                    md5, doc_type, status, last_seen_at, metadata
             FROM source_documents WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|doc| {
            let metadata: serde_json::Value =
                serde_json::from_str(&doc.metadata).unwrap_or_default();
            let mirror_key = metadata
                .get("mirror_key")
                .and_then(|v| v.as_str())
                .map(String::from);
            ResolvedDocument {
                original_url: doc.url,
                mirror_key,
                local_path: doc.file_path,
                metadata,
            }
        }))
    }

    /// Counts plus the latest document; drives `post-ingestion-check`.
    pub async fn data_summary(&self) -> Result<DataSummary> {
        let count = |table: &str| {
            let sql = format!("SELECT COUNT(*) FROM {table}");
            let pool = self.pool.clone();
            async move {
                sqlx::query_scalar::<_, i64>(&sql)
                    .fetch_one(&pool)
                    .await
            }
        };

        let latest = sqlx::query_as::<_, LatestDocument>(
            "SELECT title, publisher, fetch_date FROM source_documents
             ORDER BY fetch_date DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(DataSummary {
            countries: count("countries").await?,
            entities: count("entities").await?,
            fiscal_periods: count("fiscal_periods").await?,
            source_documents: count("source_documents").await?,
            budget_lines: count("budget_lines").await?,
            audits: count("audits").await?,
            population_rows: count("population_data").await?,
            gdp_rows: count("gdp_data").await?,
            indicator_rows: count("economic_indicators").await?,
            latest_document: latest,
        })
    }
}
