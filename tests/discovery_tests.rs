mod common;

use std::sync::Arc;

use wiremock::MockServer;

use fiscal_ops::domain::DocumentType;
use fiscal_ops::ingestion::InMemoryManifestStore;

use common::{listing_page, mount_html, test_config, test_pipeline, test_registry};

/// Links off the publisher's host are never emitted as documents.
#[tokio::test]
async fn same_host_filter_rejects_external_links() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/docs/",
        listing_page(&[
            ("/files/budget-2023.pdf", "Budget Statement 2023"),
            ("https://evil.example.com/other.pdf", "External Budget"),
            ("mailto:info@treasury.go.ke", "Write to us"),
        ]),
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
    let (pipeline, _db) =
        test_pipeline(&config, registry, Arc::new(InMemoryManifestStore::new())).await;

    let docs = pipeline.discover_source("treasury").await.unwrap();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].url.contains("/files/budget-2023.pdf"));
    assert_eq!(docs[0].doc_type, DocumentType::Budget);
}

/// Pagination is followed and results are deduplicated by URL.
#[tokio::test]
async fn pagination_followed_and_urls_deduped() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/category/budget/",
        listing_page(&[
            ("/files/budget-2023.pdf", "Budget Statement 2023"),
            ("/category/budget/page/2/", "Older posts"),
        ]),
    )
    .await;
    mount_html(
        &server,
        "/category/budget/page/2/",
        listing_page(&[
            // Duplicate of page 1 plus one new document.
            ("/files/budget-2023.pdf", "Budget Statement 2023"),
            ("/files/budget-2022.pdf", "Budget Statement 2022"),
        ]),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let registry = test_registry(
        "treasury",
        "Treasury",
        &server.uri(),
        vec![format!("{}/category/budget/", server.uri())],
    );
    let (pipeline, _db) =
        test_pipeline(&config, registry, Arc::new(InMemoryManifestStore::new())).await;

    let docs = pipeline.discover_source("treasury").await.unwrap();
    let urls: Vec<&str> = docs.iter().map(|d| d.url.as_str()).collect();
    assert_eq!(docs.len(), 2, "duplicates collapse: {urls:?}");
}

/// Tender and vacancy noise is excluded by title.
#[tokio::test]
async fn exclusion_list_filters_noise() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/docs/",
        listing_page(&[
            ("/files/budget-2023.pdf", "Budget Statement 2023"),
            ("/files/tender-42.pdf", "Tender Notice 42"),
            ("/files/vacancy.pdf", "Vacancy Announcement"),
        ]),
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
    let (pipeline, _db) =
        test_pipeline(&config, registry, Arc::new(InMemoryManifestStore::new())).await;

    let docs = pipeline.discover_source("treasury").await.unwrap();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].title.contains("Budget Statement"));
}

/// OAG sections tag documents with their level and keep breadcrumbs.
#[tokio::test]
async fn oag_documents_carry_level_metadata() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/county-governments-reports/",
        listing_page(&[(
            "/files/kisumu-county-audit-fy-2021-2022.pdf",
            "Kisumu County Audit Report FY 2021-2022",
        )]),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let registry = test_registry(
        "oag",
        "Office of the Auditor General",
        &server.uri(),
        vec![format!("{}/county-governments-reports/", server.uri())],
    );
    let (pipeline, _db) =
        test_pipeline(&config, registry, Arc::new(InMemoryManifestStore::new())).await;

    let docs = pipeline.discover_source("oag").await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].meta.level.as_deref(), Some("county"));
    assert_eq!(docs[0].doc_type, DocumentType::Audit);
    assert_eq!(docs[0].meta.year.as_deref(), Some("2021-2022"));
}

/// COB's CMS media endpoint contributes documents tagged with the wp-json
/// breadcrumb.
#[tokio::test]
async fn cob_wp_json_media_enumeration() {
    let server = MockServer::start().await;

    // No HTML sections or sitemaps resolve; only the media API answers.
    let media = serde_json::json!([
        {
            "source_url": format!("{}/wp-content/uploads/2023/birr-q4.pdf", server.uri()),
            "title": { "rendered": "County BIRR Q4 FY2022/23" }
        }
    ]);
    let empty = serde_json::json!([]);

    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/wp-json/wp/v2/media"))
        .and(wiremock::matchers::query_param("page", "1"))
        .and(wiremock::matchers::query_param("mime_type", "application/pdf"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(media))
        .mount(&server)
        .await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/wp-json/wp/v2/media"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(empty))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    // Registry with a content API pointing at the mock server.
    let registry_file = dir.path().join("sources.toml");
    std::fs::write(
        &registry_file,
        format!(
            "[[sources]]\nkey = \"cob\"\nname = \"Controller of Budget\"\ncountry = \"KE\"\nbase_url = \"{0}\"\nseeds = []\ncontent_api = \"{0}/wp-json/wp/v2/media\"\n",
            server.uri()
        ),
    )
    .unwrap();
    let registry = fiscal_ops::SourceRegistry::load(&registry_file).unwrap();

    let (pipeline, _db) =
        test_pipeline(&config, registry, Arc::new(InMemoryManifestStore::new())).await;

    let docs = pipeline.discover_source("cob").await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].meta.breadcrumbs, vec!["wp-json".to_string()]);
    assert!(docs[0].title.contains("BIRR"));
}
