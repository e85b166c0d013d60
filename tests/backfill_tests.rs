mod common;

use std::sync::Arc;

use wiremock::MockServer;

use fiscal_ops::config::BackfillSettings;
use fiscal_ops::ingestion::JsonManifestStore;
use fiscal_ops::pipeline::backfill::{run_backfill, BackfillSummary};

use common::{listing_page, make_pdf, mount_html, mount_pdf, test_config, test_pipeline, test_registry};

/// Backfill with a year window: only target-range and unknown-year
/// documents are queued; the summary file records the counts.
#[tokio::test]
async fn backfill_year_window_filters_queue() {
    let server = MockServer::start().await;

    let docs = [
        ("budget-2018", "Budget Statement 2018"),
        ("budget-2020", "Budget Statement 2020"),
        ("budget-2021", "Budget Statement 2021"),
        ("budget-2022", "Budget Statement 2022"),
        ("budget-2024", "Budget Statement 2024"),
        ("undated-budget", "Consolidated Budget Notes"),
    ];
    let links: Vec<(String, &str)> = docs
        .iter()
        .map(|(slug, title)| (format!("/files/{slug}.pdf"), *title))
        .collect();
    let link_refs: Vec<(&str, &str)> = links
        .iter()
        .map(|(href, title)| (href.as_str(), *title))
        .collect();
    mount_html(&server, "/docs/", listing_page(&link_refs)).await;
    for (slug, title) in &docs {
        mount_pdf(
            &server,
            &format!("/files/{slug}.pdf"),
            make_pdf(&[title, "County  Allocation", "Nairobi  KES 1,000"]),
        )
        .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let registry = test_registry(
        "treasury",
        "Treasury",
        &server.uri(),
        vec![format!("{}/docs/", server.uri())],
    );
    let manifest = Arc::new(JsonManifestStore::open(
        &dir.path().join("downloads/processed_manifest.json"),
    ));
    let (pipeline, database) = test_pipeline(&config, registry, manifest).await;

    let settings = BackfillSettings {
        sources: vec!["treasury".to_string()],
        year_from: Some(2020),
        year_to: Some(2022),
        concurrency: 3,
    };
    let downloads_dir = dir.path().join("downloads");
    let summary = run_backfill(Arc::new(pipeline), &settings, &downloads_dir)
        .await
        .unwrap();

    assert_eq!(summary.requested, 6);
    // 2020, 2021, 2022 plus the undated document.
    assert_eq!(summary.filtered, 4);
    assert_eq!(summary.queued_unique, 4);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 0);

    let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM source_documents")
        .fetch_one(database.pool())
        .await
        .unwrap();
    assert_eq!(documents, 4);

    // Summary artifact on disk agrees with the returned value.
    let written: BackfillSummary = serde_json::from_str(
        &std::fs::read_to_string(downloads_dir.join("backfill_summary.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(written.queued_unique, summary.queued_unique);
    assert_eq!(written.year_from, Some(2020));
    assert_eq!(written.year_to, Some(2022));
}

/// Backfill resumes from the manifest: a second sweep downloads nothing.
#[tokio::test]
async fn backfill_resumes_via_manifest() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/docs/",
        listing_page(&[("/files/budget-2021.pdf", "Budget Statement 2021")]),
    )
    .await;
    mount_pdf(
        &server,
        "/files/budget-2021.pdf",
        make_pdf(&["Budget Statement 2021"]),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let registry = test_registry(
        "treasury",
        "Treasury",
        &server.uri(),
        vec![format!("{}/docs/", server.uri())],
    );
    let manifest = Arc::new(JsonManifestStore::open(
        &dir.path().join("downloads/processed_manifest.json"),
    ));
    let (pipeline, database) = test_pipeline(&config, registry, manifest.clone()).await;
    let pipeline = Arc::new(pipeline);

    let settings = BackfillSettings {
        sources: vec!["treasury".to_string()],
        year_from: None,
        year_to: None,
        concurrency: 2,
    };
    let downloads_dir = dir.path().join("downloads");

    let first = run_backfill(Arc::clone(&pipeline), &settings, &downloads_dir)
        .await
        .unwrap();
    assert_eq!(first.succeeded, 1);

    let docs_before: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM source_documents")
        .fetch_one(database.pool())
        .await
        .unwrap();

    let second = run_backfill(pipeline, &settings, &downloads_dir).await.unwrap();
    assert_eq!(second.succeeded, 1, "manifest hits still count as processed");

    let docs_after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM source_documents")
        .fetch_one(database.pool())
        .await
        .unwrap();
    assert_eq!(docs_after, docs_before);
}
