use std::sync::Arc;
use std::time::Duration;

use super::store::MemoryAnswerStore;
use super::{AnswerCache, CachedAnswer};
use crate::embedding::{EmbeddingGateway, StubEmbedder};
use crate::language::Language;

fn payload(answer: &str) -> CachedAnswer {
    CachedAnswer {
        answer: answer.to_string(),
        context: "context".to_string(),
        citations: Vec::new(),
        follow_up: vec!["次は？".to_string()],
    }
}

fn cache_with(embedder_dim: usize) -> (Arc<StubEmbedder>, AnswerCache<MemoryAnswerStore>) {
    let embedder = Arc::new(StubEmbedder::new(embedder_dim));
    let cache = AnswerCache::new(Arc::new(MemoryAnswerStore::new()), true, 0.95, 24);
    (embedder, cache)
}

#[tokio::test]
async fn exact_question_hits_with_one_embedding_call() {
    let (embedder, cache) = cache_with(8);
    let gateway = EmbeddingGateway::new(Arc::clone(&embedder));

    let question = "法人税とは何ですか？";
    let seed = gateway.session();
    let embedding = seed.embed_query(question).await.unwrap();
    cache
        .save("t1", question, embedding, payload("A1"), Language::Zh, None)
        .await
        .unwrap();

    let session = gateway.session();
    let hit = cache
        .check(&session, "t1", question, Language::Zh)
        .await
        .unwrap()
        .expect("expected cache hit");

    assert_eq!(hit.answer, "A1");
    assert_eq!(hit.follow_up, vec!["次は？"]);
    // One embedding call within this session for the query text.
    assert_eq!(session.stats().1, 1);
}

#[tokio::test]
async fn semantic_paraphrase_hits_at_lower_threshold() {
    let (embedder, cache) = cache_with(4);
    let gateway = EmbeddingGateway::new(Arc::clone(&embedder));

    // Two phrasings planted at cosine ≈ 0.92: below 0.95, above 0.90.
    embedder.set_vector("怎么用这个系统管理文档？", vec![1.0, 0.0, 0.0, 0.0]);
    embedder.set_vector("这个系统的文档管理功能怎么使用？", vec![0.92, 0.392, 0.0, 0.0]);

    let seed = gateway.session();
    let embedding = seed.embed_query("怎么用这个系统管理文档？").await.unwrap();
    cache
        .save("t1", "怎么用这个系统管理文档？", embedding, payload("A2"), Language::Zh, None)
        .await
        .unwrap();

    let session = gateway.session();
    let miss = cache
        .check(&session, "t1", "这个系统的文档管理功能怎么使用？", Language::Zh)
        .await
        .unwrap();
    assert!(miss.is_none());

    let hit = cache
        .check_with_threshold(
            &session,
            "t1",
            "这个系统的文档管理功能怎么使用？",
            Language::Zh,
            0.90,
        )
        .await
        .unwrap();
    assert_eq!(hit.unwrap().answer, "A2");
}

#[tokio::test]
async fn expired_entries_never_hit() {
    let (embedder, cache) = cache_with(8);
    let gateway = EmbeddingGateway::new(Arc::clone(&embedder));

    let session = gateway.session();
    let embedding = session.embed_query("古い質問？").await.unwrap();
    cache
        .save("t1", "古い質問？", embedding, payload("stale"), Language::Ja, Some(-1))
        .await
        .unwrap();

    let hit = cache
        .check(&session, "t1", "古い質問？", Language::Ja)
        .await
        .unwrap();
    assert!(hit.is_none());

    assert_eq!(cache.purge_expired().await.unwrap(), 1);
}

#[tokio::test]
async fn scoped_by_tenant_and_language() {
    let (embedder, cache) = cache_with(8);
    let gateway = EmbeddingGateway::new(Arc::clone(&embedder));

    let session = gateway.session();
    let embedding = session.embed_query("shared question?").await.unwrap();
    cache
        .save("t1", "shared question?", embedding, payload("for-t1"), Language::En, None)
        .await
        .unwrap();

    assert!(cache
        .check(&session, "t2", "shared question?", Language::En)
        .await
        .unwrap()
        .is_none());
    assert!(cache
        .check(&session, "t1", "shared question?", Language::Ja)
        .await
        .unwrap()
        .is_none());
    assert!(cache
        .check(&session, "t1", "shared question?", Language::En)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn clear_then_check_misses() {
    let (embedder, cache) = cache_with(8);
    let gateway = EmbeddingGateway::new(Arc::clone(&embedder));

    let session = gateway.session();
    let embedding = session.embed_query("q?").await.unwrap();
    cache
        .save("t1", "q?", embedding, payload("a"), Language::Zh, None)
        .await
        .unwrap();

    assert_eq!(cache.clear("t1").await.unwrap(), 1);
    assert!(cache
        .check(&session, "t1", "q?", Language::Zh)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn clear_by_answer_purges_matching_entries_only() {
    let (embedder, cache) = cache_with(8);
    let gateway = EmbeddingGateway::new(Arc::clone(&embedder));
    let session = gateway.session();

    for (question, answer) in [("q1?", "OLD"), ("q2?", "OLD"), ("q3?", "other")] {
        let embedding = session.embed_query(question).await.unwrap();
        cache
            .save("t1", question, embedding, payload(answer), Language::Zh, None)
            .await
            .unwrap();
    }

    assert_eq!(cache.clear_by_answer("t1", "OLD").await.unwrap(), 2);
    assert!(cache
        .check(&session, "t1", "q3?", Language::Zh)
        .await
        .unwrap()
        .is_some());
    assert!(cache
        .check(&session, "t1", "q1?", Language::Zh)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn disabled_cache_is_inert() {
    let embedder = Arc::new(StubEmbedder::new(8));
    let store = Arc::new(MemoryAnswerStore::new());
    let cache = AnswerCache::new(Arc::clone(&store), false, 0.95, 24);
    let gateway = EmbeddingGateway::new(Arc::clone(&embedder));
    let session = gateway.session();

    cache
        .save("t1", "q?", vec![0.0; 8], payload("a"), Language::Zh, None)
        .await
        .unwrap();
    assert!(store.is_empty());
    assert!(cache
        .check(&session, "t1", "q?", Language::Zh)
        .await
        .unwrap()
        .is_none());
    // Disabled checks never spend an embedding call.
    assert_eq!(embedder.call_count(), 0);
}

#[tokio::test]
async fn hit_count_is_bumped_off_the_response_path() {
    let (embedder, _) = cache_with(8);
    let store = Arc::new(MemoryAnswerStore::new());
    let cache = AnswerCache::new(Arc::clone(&store), true, 0.95, 24);
    let gateway = EmbeddingGateway::new(Arc::clone(&embedder));
    let session = gateway.session();

    let embedding = session.embed_query("q?").await.unwrap();
    cache
        .save("t1", "q?", embedding, payload("a"), Language::Zh, None)
        .await
        .unwrap();

    cache
        .check(&session, "t1", "q?", Language::Zh)
        .await
        .unwrap()
        .expect("hit");

    // The bump runs on a spawned task; give it a moment.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.len(), 1);
    assert_eq!(store.total_hits(), 1);
}
