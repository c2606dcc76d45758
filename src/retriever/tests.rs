use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use super::{Retriever, is_error_chunk, truncate_chars};
use crate::embedding::{EmbeddingGateway, StubEmbedder};
use crate::vectorstore::{DiskVectorStore, QueryMatch, VectorRecord, VectorStore};

fn long_text(prefix: &str) -> String {
    format!("{prefix} {}", "content ".repeat(20))
}

async fn seeded_store(records: Vec<VectorRecord>) -> (TempDir, Arc<DiskVectorStore>) {
    let dir = TempDir::new().unwrap();
    let store = DiskVectorStore::open(dir.path()).await.unwrap();
    store.get_or_create("kb1", 8).await.unwrap();
    store.upsert("kb1", records).await.unwrap();
    (dir, Arc::new(store))
}

#[test]
fn truncation_respects_char_boundaries() {
    let text = "あ".repeat(600);
    let truncated = truncate_chars(&text, 500);
    assert_eq!(truncated.chars().count(), 500);
    assert_eq!(truncate_chars("short", 500), "short");
}

#[test]
fn error_chunks_are_recognized() {
    let markered = QueryMatch {
        id: "kb1_0".into(),
        score: 0.9,
        metadata: json!({"text": "爬取失败: https://example.com timed out plus enough filler text"}),
    };
    assert!(is_error_chunk(&markered));

    let flagged = QueryMatch {
        id: "kb1_1".into(),
        score: 0.9,
        metadata: json!({"text": long_text("fine"), "error": "parse failed"}),
    };
    assert!(is_error_chunk(&flagged));

    let clean = QueryMatch {
        id: "kb1_2".into(),
        score: 0.9,
        metadata: json!({"text": long_text("fine")}),
    };
    assert!(!is_error_chunk(&clean));
}

#[tokio::test]
async fn retrieval_builds_context_and_citations() {
    let embedder = Arc::new(StubEmbedder::new(8));
    let query_vec = vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
    embedder.set_vector("申告期限", query_vec.clone());

    let (_dir, store) = seeded_store(vec![
        VectorRecord::new(
            "kb1_0",
            query_vec.clone(),
            json!({"text": long_text("特定支配関係の説明"), "source": "guide.pdf"}),
        ),
        VectorRecord::new(
            "kb1_1",
            vec![0.9, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            json!({"text": long_text("別の説明"), "source": "https://example.com/tax"}),
        ),
        VectorRecord::new(
            "kb1_2",
            vec![0.8, 0.2, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            json!({"text": "too short"}),
        ),
    ])
    .await;

    let gateway = EmbeddingGateway::new(embedder);
    let session = gateway.session();
    let retriever = Retriever::new(store, 4, 8);

    let retrieval = retriever
        .retrieve(&session, "kb1", "申告期限")
        .await
        .unwrap();

    assert!(!retrieval.empty);
    assert!(!retrieval.degraded);
    assert!(retrieval.context.contains("特定支配関係の説明"));
    assert!(!retrieval.context.contains("too short"));
    assert_eq!(retrieval.citations.len(), 2);
    assert_eq!(retrieval.citations[0].source, "guide.pdf");
    assert!(retrieval.citations[0].score.unwrap() > 0.99);
    assert!(retrieval.citations.iter().all(|c| c.content.chars().count() <= 500));
}

#[tokio::test]
async fn all_filtered_falls_back_degraded() {
    let embedder = Arc::new(StubEmbedder::new(8));
    let (_dir, store) = seeded_store(vec![
        VectorRecord::new(
            "kb1_0",
            vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            json!({"text": format!("解析失敗 parse failed: {}", "x".repeat(80))}),
        ),
    ])
    .await;

    let gateway = EmbeddingGateway::new(embedder);
    let session = gateway.session();
    let retriever = Retriever::new(store, 4, 8);

    let retrieval = retriever.retrieve(&session, "kb1", "anything").await.unwrap();
    assert!(retrieval.degraded);
    assert!(retrieval.citations.is_empty());
}

#[tokio::test]
async fn empty_collection_flags_empty_context() {
    let embedder = Arc::new(StubEmbedder::new(8));
    let (_dir, store) = seeded_store(vec![]).await;

    let gateway = EmbeddingGateway::new(embedder);
    let session = gateway.session();
    let retriever = Retriever::new(store, 4, 8);

    let retrieval = retriever.retrieve(&session, "kb1", "anything").await.unwrap();
    assert!(retrieval.empty);
    assert!(retrieval.citations.is_empty());
}
