use chrono::Utc;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

use fiscal_ops::domain::record::{AuditFindingRecord, BudgetLineRecord, PopulationRecord};
use fiscal_ops::domain::{
    DocumentRecord, DocumentType, EntityInfo, EntityType, NormalizedAmount, NormalizedPeriod,
    ParsedRecord, Provenance, Severity,
};
use fiscal_ops::storage::{Database, Loader, Queries};

fn document(title: &str, url: &str, md5: &str) -> DocumentRecord {
    DocumentRecord {
        title: title.to_string(),
        url: url.to_string(),
        file_path: format!("downloads/{md5}.pdf"),
        publisher: "Controller of Budget".to_string(),
        source_key: "cob".to_string(),
        doc_type: DocumentType::Budget,
        fetch_date: Utc::now(),
        md5: Some(md5.to_string()),
        metadata: serde_json::json!({"source_key": "cob"}),
    }
}

fn amount(value: i64) -> NormalizedAmount {
    NormalizedAmount::new(dec!(1) * rust_decimal::Decimal::from(value), "KES", dec!(1))
}

fn budget_line(entity: &str, category: &str, allocated: i64) -> ParsedRecord {
    ParsedRecord::BudgetLine(BudgetLineRecord {
        entity: EntityInfo::new(entity, EntityType::County),
        fiscal_period: Some(NormalizedPeriod::fiscal_year(2023)),
        category: category.to_string(),
        subcategory: None,
        allocated_amount: Some(amount(allocated)),
        actual_amount: Some(amount(allocated / 2)),
        committed_amount: None,
        provenance: Provenance::for_table(1, 0, 0, 0.7),
    })
}

async fn setup() -> (Database, Loader, Queries) {
    let database = Database::connect_memory().await.unwrap();
    let loader = Loader::new(database.pool().clone());
    let queries = Queries::new(database.pool().clone());
    (database, loader, queries)
}

async fn count(database: &Database, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(database.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn load_document_is_idempotent() {
    let (database, loader, _) = setup().await;

    let doc = document("County Budget 2023", "http://cob.test/budget.pdf", "aaa111");
    let records = vec![
        budget_line("Nairobi", "Health", 1_000_000),
        budget_line("Nairobi", "Roads", 2_000_000),
        budget_line("Mombasa", "Health", 500_000),
    ];

    let first = loader.load_document(&doc, &records).await.unwrap();
    assert_eq!(first.created, 3);

    let docs_before = count(&database, "source_documents").await;
    let lines_before = count(&database, "budget_lines").await;
    let entities_before = count(&database, "entities").await;

    // Second ingest of the same document converges.
    let second = loader.load_document(&doc, &records).await.unwrap();
    assert_eq!(second.document_id, first.document_id);
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, 3);

    assert_eq!(count(&database, "source_documents").await, docs_before);
    assert_eq!(count(&database, "budget_lines").await, lines_before);
    assert_eq!(count(&database, "entities").await, entities_before);
}

#[tokio::test]
async fn same_md5_under_second_url_reuses_document() {
    let (database, loader, _) = setup().await;

    let doc_a = document("Budget mirror A", "http://cob.test/a.pdf", "md5same");
    let doc_b = document("Budget mirror B", "http://cob.test/b.pdf", "md5same");

    let first = loader.load_document(&doc_a, &[]).await.unwrap();
    let second = loader.load_document(&doc_b, &[]).await.unwrap();

    assert_eq!(first.document_id, second.document_id);
    assert_eq!(count(&database, "source_documents").await, 1);
}

#[tokio::test]
async fn unique_key_collision_takes_update_path() {
    let (database, loader, _) = setup().await;

    let doc_a = document("Budget v1", "http://cob.test/v1.pdf", "v1hash");
    let doc_b = document("Budget v2", "http://cob.test/v2.pdf", "v2hash");

    loader
        .load_document(&doc_a, &[budget_line("Nairobi", "Health", 100)])
        .await
        .unwrap();

    // Same natural key from a second document, different value.
    let outcome = loader
        .load_document(&doc_b, &[budget_line("Nairobi", "Health", 999)])
        .await
        .unwrap();
    assert_eq!(outcome.updated, 1);
    assert_eq!(outcome.created, 0);

    assert_eq!(count(&database, "budget_lines").await, 1);
    let (allocated, provenance): (String, String) = sqlx::query_as(
        "SELECT allocated_amount, provenance FROM budget_lines LIMIT 1",
    )
    .fetch_one(database.pool())
    .await
    .unwrap();
    assert_eq!(allocated, "999.00");
    // Provenance still references the original document.
    let parsed: serde_json::Value = serde_json::from_str(&provenance).unwrap();
    assert_eq!(parsed[0]["source_document_id"], 1);
}

#[tokio::test]
async fn every_fact_row_has_provenance_with_document_id() {
    let (database, loader, _) = setup().await;

    let doc = document("Audit FY2022/23", "http://oag.test/a.pdf", "audmd5");
    let records = vec![ParsedRecord::AuditFinding(AuditFindingRecord {
        finding_text: "Irregular expenditure of KES 9,000,000".to_string(),
        severity: Severity::Warning,
        recommended_action: Some("Recover the amount.".to_string()),
        amount: Some(amount(9_000_000)),
        entity: Some(EntityInfo::new("Nairobi County", EntityType::County)),
        fiscal_period: Some(NormalizedPeriod::fiscal_year(2022)),
        provenance: Provenance::for_page(4, 0.6),
    })];

    let outcome = loader.load_document(&doc, &records).await.unwrap();

    let provenance: String = sqlx::query_scalar("SELECT provenance FROM audits LIMIT 1")
        .fetch_one(database.pool())
        .await
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&provenance).unwrap();
    let list = parsed.as_array().unwrap();
    assert!(!list.is_empty());
    assert_eq!(
        list[0]["source_document_id"].as_i64().unwrap(),
        outcome.document_id
    );
    assert_eq!(list[0]["page"], 4);
}

#[tokio::test]
async fn entity_slug_is_stable_across_runs() {
    let (database, loader, _) = setup().await;

    let info = EntityInfo::new("Tharaka Nithi County", EntityType::County);
    let id_first = loader.ensure_entity(&info).await.unwrap();
    let id_second = loader.ensure_entity(&info).await.unwrap();
    assert_eq!(id_first, id_second);

    let slug: String = sqlx::query_scalar("SELECT slug FROM entities WHERE id = ?")
        .bind(id_first)
        .fetch_one(database.pool())
        .await
        .unwrap();
    assert_eq!(slug, "tharaka-nithi-county");
}

#[tokio::test]
async fn population_sanity_skip_rule() {
    let (database, loader, _) = setup().await;

    let doc = document("Census 2019", "http://knbs.test/census.pdf", "popmd5");
    let records = vec![ParsedRecord::PopulationData(PopulationRecord {
        entity: None,
        year: 2019,
        total_population: 0,
        male_population: None,
        female_population: None,
        urban_population: None,
        rural_population: None,
        population_density: None,
        provenance: Provenance::for_page(1, 0.8),
    })];

    let outcome = loader.load_document(&doc, &records).await.unwrap();
    assert_eq!(outcome.skipped, 1);
    assert_eq!(count(&database, "population_data").await, 0);
}

#[tokio::test]
async fn entity_aggregates_in_read_queries() {
    let (_database, loader, queries) = setup().await;

    let doc = document("Budget 2023", "http://cob.test/q.pdf", "aggmd5");
    loader
        .load_document(&doc, &[budget_line("Kisumu", "Water", 1_000)])
        .await
        .unwrap();

    let entities = queries.list_entities(None, Some("Kisumu"), 1, 20).await.unwrap();
    assert_eq!(entities.len(), 1);
    let summary = &entities[0];
    assert_eq!(summary.canonical_name, "Kisumu County");
    assert!((summary.allocated_sum - 1000.0).abs() < 0.01);
    assert!((summary.spent_sum - 500.0).abs() < 0.01);
    assert!((summary.execution_rate - 0.5).abs() < 0.001);
}

#[tokio::test]
async fn loan_upsert_refreshes_values() {
    let (database, loader, _) = setup().await;

    let doc = document("Debt Bulletin 2024", "http://treasury.test/debt.pdf", "loanmd5");
    let outcome = loader.load_document(&doc, &[]).await.unwrap();

    let loan = fiscal_ops::storage::repository::LoanInput {
        entity: EntityInfo::national(),
        lender: "World Bank".to_string(),
        debt_category: fiscal_ops::domain::DebtCategory::ExternalMultilateral,
        principal: dec!(1000000000),
        outstanding: dec!(800000000),
        interest_rate: Some(dec!(2.5)),
        issue_date: chrono::NaiveDate::from_ymd_opt(2020, 1, 15).unwrap(),
        maturity_date: chrono::NaiveDate::from_ymd_opt(2040, 1, 15),
        currency: "USD".to_string(),
    };
    loader.upsert_loan(outcome.document_id, &loan).await.unwrap();

    // Same (entity, lender, issue_date): values refresh, no second row.
    let mut updated = loan.clone();
    updated.outstanding = dec!(750000000);
    loader.upsert_loan(outcome.document_id, &updated).await.unwrap();

    assert_eq!(count(&database, "loans").await, 1);
    let outstanding: String = sqlx::query_scalar("SELECT outstanding FROM loans LIMIT 1")
        .fetch_one(database.pool())
        .await
        .unwrap();
    assert_eq!(outstanding, "750000000.00");
}

#[tokio::test]
async fn summary_aggregate_upserts() {
    let (database, loader, _) = setup().await;

    loader
        .upsert_debt_timeline(2024, Some(dec!(5000)), Some(dec!(3000)))
        .await
        .unwrap();
    loader
        .upsert_debt_timeline(2024, Some(dec!(5500)), Some(dec!(3000)))
        .await
        .unwrap();
    assert_eq!(count(&database, "debt_timelines").await, 1);
    let total: String = sqlx::query_scalar("SELECT total_debt FROM debt_timelines LIMIT 1")
        .fetch_one(database.pool())
        .await
        .unwrap();
    assert_eq!(total, "8500.00");

    loader
        .upsert_fiscal_summary("FY2024/25", Some(dec!(100)), Some(dec!(120)))
        .await
        .unwrap();
    let deficit: String = sqlx::query_scalar("SELECT deficit FROM fiscal_summaries LIMIT 1")
        .fetch_one(database.pool())
        .await
        .unwrap();
    assert_eq!(deficit, "20.00");

    loader
        .upsert_revenue_source("FY2024/25", "Income Tax", Some(dec!(60)))
        .await
        .unwrap();
    loader
        .upsert_revenue_source("FY2024/25", "Income Tax", Some(dec!(65)))
        .await
        .unwrap();
    assert_eq!(count(&database, "revenue_by_source").await, 1);
}

#[tokio::test]
async fn document_status_and_resolution() {
    let (_database, loader, queries) = setup().await;

    let doc = document("Budget 2023", "http://cob.test/resolve.pdf", "resmd5");
    let outcome = loader.load_document(&doc, &[]).await.unwrap();

    loader
        .update_document_status(outcome.document_id, fiscal_ops::DocumentStatus::Failed)
        .await
        .unwrap();

    let storage = queries.storage_status().await.unwrap();
    assert_eq!(storage.total_documents, 1);
    assert_eq!(storage.failed_documents, 1);
    assert_eq!(storage.mirrored_documents, 0);

    let resolved = queries
        .resolve_document("http://cob.test/resolve.pdf")
        .await
        .unwrap()
        .expect("document should resolve");
    assert_eq!(
        resolved.original_url.as_deref(),
        Some("http://cob.test/resolve.pdf")
    );
    assert!(resolved.local_path.is_some());
    assert!(resolved.mirror_key.is_none());

    let status = queries.source_status().await.unwrap();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].source_key, "cob");
    assert_eq!(status[0].document_count, 1);
}

#[tokio::test]
async fn gcp_table_rows_load_per_year() {
    use fiscal_ops::engine::extractor::{ExtractedTable, Extraction, TableData};
    use fiscal_ops::StatisticsParser;

    let (database, loader, _) = setup().await;

    let mut extraction = Extraction::empty("lattice");
    extraction.tables.push(ExtractedTable {
        page: 4,
        table_index: 0,
        data: TableData {
            headers: vec![
                "Economic activities (KSh Billion)".into(),
                "2019".into(),
                "2020".into(),
                "2021".into(),
                "2022".into(),
                "2023".into(),
            ],
            rows: vec![vec![
                "GCP Kiambu".into(),
                "420".into(),
                "440".into(),
                "470".into(),
                "505".into(),
                "540".into(),
            ]],
        },
    });

    let parser = StatisticsParser::default();
    let records = parser.parse(&extraction, "Gross County Product 2023");

    let doc = document("Gross County Product 2023", "http://knbs.test/gcp.pdf", "gcpmd5");
    let outcome = loader.load_document(&doc, &records).await.unwrap();
    assert_eq!(outcome.created, 5);

    let rows: Vec<(i64, f64)> = sqlx::query_as(
        "SELECT g.year, g.gdp_value FROM gdp_data g
         JOIN entities e ON e.id = g.entity_id
         WHERE e.canonical_name = 'Kiambu County'
         ORDER BY g.year",
    )
    .fetch_all(database.pool())
    .await
    .unwrap();

    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0].0, 2019);
    assert!((rows[0].1 - 420_000_000_000.0).abs() < 1.0);
    assert_eq!(rows[4].0, 2023);
    assert!((rows[4].1 - 540_000_000_000.0).abs() < 1.0);
}
