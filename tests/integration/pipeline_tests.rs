//! Integration tests for the pipeline
//!
//! These tests use wiremock to serve PDFs over HTTP and run complete
//! batches end-to-end against a SQLite store on disk.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pdf_harvester::config::Config;
use pdf_harvester::storage::{
    DocumentFilter, ErrorKind, InitialMetadata, Storage, StoreHandle,
};
use pdf_harvester::{Coordinator, DocumentStatus, Manifest, ProcessingStage};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE_TEXT: &str = "Regional drought assessment reviewing rainfall and drought response";

/// Builds a text PDF with one page per entry of `pages`
fn build_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
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

/// Creates a test configuration rooted in `dir` with no waiting between attempts
fn create_test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.fetcher.retry_delay_ms = 0;
    config.fetcher.request_delay_ms = 0;
    config.fetcher.timeout_secs = 5;
    config.storage.database_path = dir.join("harvest.db").display().to_string();
    config.storage.download_dir = dir.join("downloads").display().to_string();
    config
}

fn open_store(config: &Config) -> StoreHandle {
    StoreHandle::open(Path::new(&config.storage.database_path)).unwrap()
}

async fn mount_pdf(server: &MockServer, route: &str, bytes: Vec<u8>) {
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

#[tokio::test]
async fn test_manifest_download_completes() {
    let server = MockServer::start().await;
    mount_pdf(&server, "/report.pdf", build_pdf(&[PAGE_TEXT, PAGE_TEXT])).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let store = open_store(&config);
    let coordinator = Coordinator::new(config.clone(), store.clone()).unwrap();

    let manifest =
        Manifest::from_json(&format!(r#"{{"pdf1": "{}/report.pdf"}}"#, server.uri())).unwrap();
    let report = coordinator.process_manifest(&manifest).await.unwrap();

    assert_eq!(report.successful, 1);
    assert_eq!(report.failed, 0);
    assert!(Path::new(&config.storage.download_dir)
        .join("pdf01.pdf")
        .exists());

    let doc = store
        .with(|s| s.get_document_by_filename("pdf01.pdf"))
        .unwrap()
        .expect("document should be stored");
    assert_eq!(doc.status, DocumentStatus::Completed);
    assert_eq!(doc.processing_stage, ProcessingStage::Stored);
    assert_eq!(doc.page_count, Some(2));
    assert!(doc.summary.is_some());
    assert!(!doc.keywords.is_empty());
    assert!(doc.keywords.len() <= 10);
    assert_eq!(doc.keywords[0].word, "drought");
    assert!(doc.keywords.iter().all(|k| k.word.chars().count() > 3));
    assert_eq!(doc.file_hash.as_ref().map(|h| h.len()), Some(64));
}

#[tokio::test]
async fn test_unreachable_url_records_download_error() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let store = open_store(&config);
    let coordinator = Coordinator::new(config, store.clone()).unwrap();

    let manifest = Manifest::from_json(r#"{"pdf1": "http://127.0.0.1:1/doc.pdf"}"#).unwrap();
    let report = coordinator.process_manifest(&manifest).await.unwrap();

    assert_eq!(report.successful, 0);
    assert_eq!(report.failed, 1);

    let doc = store
        .with(|s| s.get_document_by_filename("pdf01.pdf"))
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Error);

    let errors = store.with(|s| s.errors_for("pdf01.pdf")).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::Download);
}

#[tokio::test]
async fn test_http_error_is_retried_then_recorded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let store = open_store(&config);
    let coordinator = Coordinator::new(config.clone(), store.clone()).unwrap();

    let manifest =
        Manifest::from_json(&format!(r#"{{"pdf1": "{}/missing.pdf"}}"#, server.uri())).unwrap();
    let report = coordinator.process_manifest(&manifest).await.unwrap();

    assert_eq!(report.failed, 1);
    assert!(!Path::new(&config.storage.download_dir)
        .join("pdf01.pdf")
        .exists());

    let errors = store.with(|s| s.errors_for("pdf01.pdf")).unwrap();
    assert!(errors[0].message.contains("404"));
}

#[tokio::test]
async fn test_one_failure_does_not_abort_batch() {
    let server = MockServer::start().await;
    mount_pdf(&server, "/a.pdf", build_pdf(&[PAGE_TEXT])).await;
    mount_pdf(&server, "/c.pdf", build_pdf(&[PAGE_TEXT])).await;
    Mock::given(method("GET"))
        .and(path("/b.pdf"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let store = open_store(&config);
    let coordinator = Coordinator::new(config, store.clone()).unwrap();

    let uri = server.uri();
    let manifest = Manifest::from_json(&format!(
        r#"{{"pdf1": "{uri}/a.pdf", "pdf2": "{uri}/b.pdf", "pdf3": "{uri}/c.pdf"}}"#
    ))
    .unwrap();
    let report = coordinator.process_manifest(&manifest).await.unwrap();

    assert_eq!(report.successful, 2);
    assert_eq!(report.failed, 1);

    let failed = store
        .with(|s| s.query_documents(&DocumentFilter::with_status(DocumentStatus::Error)))
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].filename, "pdf02.pdf");
}

#[tokio::test]
async fn test_rerun_does_not_download_completed_documents() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(build_pdf(&[PAGE_TEXT]))
                .insert_header("content-type", "application/pdf"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let manifest =
        Manifest::from_json(&format!(r#"{{"pdf1": "{}/report.pdf"}}"#, server.uri())).unwrap();

    {
        let store = open_store(&config);
        let coordinator = Coordinator::new(config.clone(), store.clone()).unwrap();
        let report = coordinator.process_manifest(&manifest).await.unwrap();
        assert_eq!(report.successful, 1);
        drop(coordinator);
        store.close().unwrap();
    }

    let store = open_store(&config);
    let coordinator = Coordinator::new(config, store.clone()).unwrap();
    let report = coordinator.process_manifest(&manifest).await.unwrap();

    assert_eq!(report.successful, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped, 1);

    let by_keyword = store
        .with(|s| s.query_documents(&DocumentFilter::with_keyword("drought")))
        .unwrap();
    assert_eq!(by_keyword.len(), 1);
}

#[tokio::test]
async fn test_empty_directory_reports_nothing() {
    let dir = TempDir::new().unwrap();
    let pdfs = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let store = open_store(&config);
    let coordinator = Coordinator::new(config, store).unwrap();

    let report = coordinator.process_directory(pdfs.path()).await.unwrap();
    assert_eq!(report.successful, 0);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn test_directory_of_local_pdfs() {
    let dir = TempDir::new().unwrap();
    let pdfs = TempDir::new().unwrap();
    std::fs::write(pdfs.path().join("first.pdf"), build_pdf(&[PAGE_TEXT])).unwrap();
    std::fs::write(pdfs.path().join("second.pdf"), build_pdf(&[PAGE_TEXT, PAGE_TEXT])).unwrap();

    let config = create_test_config(dir.path());
    let store = open_store(&config);
    let coordinator = Coordinator::new(config, store.clone()).unwrap();

    let report = coordinator.process_directory(pdfs.path()).await.unwrap();
    assert_eq!(report.successful, 2);
    assert_eq!(report.failed, 0);

    let second = store
        .with(|s| s.get_document_by_filename("second.pdf"))
        .unwrap()
        .unwrap();
    assert_eq!(second.page_count, Some(2));
    assert_eq!(store.with(|s| s.history(second.id)).unwrap().len(), 1);
}

#[tokio::test]
async fn test_double_initial_upsert_creates_one_document() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let store = open_store(&config);

    let metadata = InitialMetadata {
        filename: "pdf01.pdf".to_string(),
        source_url: Some("https://example.gov/a.pdf".to_string()),
        local_path: "/tmp/pdf01.pdf".to_string(),
    };

    let first = store.with(|s| s.upsert_initial(&metadata)).unwrap();
    let second = store.with(|s| s.upsert_initial(&metadata)).unwrap();
    assert_eq!(first, second);

    let all = store
        .with(|s| s.query_documents(&DocumentFilter::default()))
        .unwrap();
    assert_eq!(all.len(), 1);
}
