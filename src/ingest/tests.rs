use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use super::{Document, Ingestor, is_error_document};
use crate::embedding::{EmbeddingGateway, StubEmbedder};
use crate::llm::ChatClient;
use crate::tenant::Tenant;
use crate::vectorstore::{DiskVectorStore, VectorStore, questions_collection};

const DIM: usize = 16;

struct Fixture {
    _dir: TempDir,
    store: Arc<DiskVectorStore>,
    ingestor: Ingestor<DiskVectorStore, StubEmbedder>,
    tenant: Tenant,
}

async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(DiskVectorStore::open(dir.path()).await.unwrap());
    let embedder = Arc::new(StubEmbedder::new(DIM));
    let ingestor = Ingestor::new(
        Arc::clone(&store),
        EmbeddingGateway::new(embedder),
        ChatClient::new_mock("test-model"),
        5,
    );
    Fixture {
        _dir: dir,
        store,
        ingestor,
        tenant: Tenant::new("kb-1", "tok-1", "kb1"),
    }
}

fn long_document(source: &str) -> Document {
    Document::new(
        "The corporate tax filing deadline falls two months after the fiscal year ends. \
         Extensions can be requested before the original deadline passes. "
            .repeat(30),
        source,
    )
}

#[test]
fn error_documents_are_recognized() {
    let mut doc = Document::new("爬取失败: connection refused", "https://example.com");
    assert!(is_error_document(&doc));

    doc = Document::new("fine text", "doc.pdf");
    assert!(!is_error_document(&doc));

    let flagged = Document {
        text: "fine text".to_string(),
        metadata: json!({"source": "u", "error": "parse failed"}),
    };
    assert!(is_error_document(&flagged));
}

#[tokio::test]
async fn indexing_stores_chunks_with_source_metadata() {
    let f = fixture().await;
    let stored = f
        .ingestor
        .index_documents(&f.tenant, vec![long_document("tax-guide.pdf")])
        .await
        .unwrap();

    assert!(stored > 1);
    assert_eq!(f.store.count("kb1").await.unwrap(), stored);

    let probe = vec![0.25; DIM];
    let matches = f.store.query("kb1", &probe, 1).await.unwrap();
    assert_eq!(matches[0].source(), "tax-guide.pdf");
    assert!(matches[0].id.starts_with("kb1_"));
}

#[tokio::test]
async fn reingestion_appends_instead_of_overwriting() {
    let f = fixture().await;
    let first = f
        .ingestor
        .index_documents(&f.tenant, vec![long_document("a.pdf")])
        .await
        .unwrap();
    let second = f
        .ingestor
        .index_documents(&f.tenant, vec![long_document("b.pdf")])
        .await
        .unwrap();

    assert_eq!(f.store.count("kb1").await.unwrap(), first + second);
}

#[tokio::test]
async fn error_documents_are_skipped_entirely() {
    let f = fixture().await;
    let stored = f
        .ingestor
        .index_documents(
            &f.tenant,
            vec![Document::new(
                format!("解析失败: {}", "filler ".repeat(50)),
                "broken.pptx",
            )],
        )
        .await
        .unwrap();

    assert_eq!(stored, 0);
    assert_eq!(f.store.count("kb1").await.unwrap(), 0);
}

#[tokio::test]
async fn seeding_without_chunks_is_a_no_op() {
    let f = fixture().await;
    let seeded = f.ingestor.seed_questions(&f.tenant).await.unwrap();
    assert_eq!(seeded, 0);
    assert_eq!(
        f.store
            .count(&questions_collection("kb1"))
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn seeding_with_mock_model_fails_parse_cleanly() {
    // The mock provider returns prose; seeding must surface a parse error
    // rather than store garbage.
    let f = fixture().await;
    f.ingestor
        .index_documents(&f.tenant, vec![long_document("a.pdf")])
        .await
        .unwrap();

    let result = f.ingestor.seed_questions(&f.tenant).await;
    assert!(result.is_err());
    assert_eq!(
        f.store
            .count(&questions_collection("kb1"))
            .await
            .unwrap(),
        0
    );
}
