//! Shared helpers for the integration suite: throwaway configs, a fake
//! publisher site on wiremock, and programmatic PDFs with a real text layer.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fiscal_ops::config::Config;
use fiscal_ops::ingestion::{Mirror, SourceRegistry};
use fiscal_ops::pipeline::Pipeline;
use fiscal_ops::storage::Database;
use fiscal_ops::ManifestStore;

/// Config tuned for tests: no pacing, short retries, tempdir storage.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.database.url = "sqlite::memory:".to_string();
    config.storage.downloads_dir = root.join("downloads");
    config.storage.reports_dir = root.join("reports");
    config.storage.sources_file = root.join("sources.toml");
    config.http.timeout_secs = 5;
    config.http.hash_timeout_secs = 2;
    config.http.retry_attempts = 2;
    config.http.courtesy_delay_ms = 0;
    config.http.document_delay_ms = 0;
    config
}

/// Registry with one source pointing at the fake publisher.
pub fn test_registry(key: &str, name: &str, base_url: &str, seeds: Vec<String>) -> SourceRegistry {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sources.toml");
    let mut contents = format!(
        "[[sources]]\nkey = \"{key}\"\nname = \"{name}\"\ncountry = \"KE\"\nbase_url = \"{base_url}\"\nseeds = [\n"
    );
    for seed in &seeds {
        contents.push_str(&format!("    \"{seed}\",\n"));
    }
    contents.push_str("]\n");
    std::fs::write(&path, contents).unwrap();
    let registry = SourceRegistry::load(&path).unwrap();
    // tempdir may be dropped now; the registry is fully in memory.
    registry
}

pub async fn test_pipeline(
    config: &Config,
    registry: SourceRegistry,
    manifest: Arc<dyn ManifestStore>,
) -> (Pipeline, Database) {
    let database = Database::connect_memory().await.unwrap();
    let pipeline = Pipeline::new(config, &database, registry, manifest, Mirror::disabled()).unwrap();
    (pipeline, database)
}

/// A minimal but valid PDF whose text layer yields exactly `lines`, one
/// per page line.
pub fn make_pdf(lines: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 11.into()]));
        operations.push(Operation::new(
            "Td",
            vec![50.into(), (750 - (index as i64) * 14).into()],
        ));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("ET", vec![]));
    }
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().unwrap(),
    ));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Mount an HTML page at `route`.
pub async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Mount a PDF at `route`.
pub async fn mount_pdf(server: &MockServer, route: &str, bytes: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(bytes)
                .insert_header("content-type", "application/pdf"),
        )
        .mount(server)
        .await;
}

/// Anchor list page linking the given (href, label) pairs.
pub fn listing_page(links: &[(&str, &str)]) -> String {
    let mut body = String::from("<html><body><h1>Documents</h1>\n");
    for (href, label) in links {
        body.push_str(&format!("<a href=\"{href}\">{label}</a>\n"));
    }
    body.push_str("</body></html>");
    body
}
