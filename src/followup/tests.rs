use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use super::{FollowUpRecommender, merge_queries};
use crate::embedding::{EmbeddingGateway, StubEmbedder};
use crate::language::Language;
use crate::llm::ChatClient;
use crate::tenant::Tenant;
use crate::vectorstore::{DiskVectorStore, VectorRecord, VectorStore, questions_collection};

const DIM: usize = 32;

fn unit(axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[axis] = 1.0;
    v
}

fn blend(a: &[f32], b: &[f32], wa: f32, wb: f32) -> Vec<f32> {
    let mut v: Vec<f32> = a.iter().zip(b).map(|(x, y)| wa * x + wb * y).collect();
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter_mut().for_each(|x| *x /= norm);
    v
}

struct Fixture {
    _dir: TempDir,
    embedder: Arc<StubEmbedder>,
    recommender: FollowUpRecommender<DiskVectorStore>,
    tenant: Tenant,
    store: Arc<DiskVectorStore>,
}

async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(DiskVectorStore::open(dir.path()).await.unwrap());
    let embedder = Arc::new(StubEmbedder::new(DIM));
    let recommender = FollowUpRecommender::new(
        Arc::clone(&store),
        ChatClient::new_mock("test-model"),
        true,
        0.85,
        0.85,
    );
    Fixture {
        _dir: dir,
        embedder,
        recommender,
        tenant: Tenant::new("kb-1", "tok-1", "kb1"),
        store,
    }
}

async fn seed_questions(f: &Fixture, records: Vec<(&str, &str, Vec<f32>)>) {
    let collection = questions_collection(&f.tenant.collection);
    f.store.get_or_create(&collection, DIM).await.unwrap();
    let records = records
        .into_iter()
        .enumerate()
        .map(|(i, (question, language, vector))| {
            VectorRecord::new(
                format!("{collection}_kb-1_{i}"),
                vector,
                json!({"question": question, "language": language, "kb_id": "kb-1", "text": question}),
            )
        })
        .collect();
    f.store.upsert(&collection, records).await.unwrap();
}

#[test]
fn merge_dedupes_case_insensitively_and_caps_at_five() {
    let merged = merge_queries(
        "What is corporate tax?",
        vec![
            "what is corporate tax?".to_string(),
            "Corporate tax meaning?".to_string(),
            "s2?".to_string(),
        ],
        vec!["s3?".to_string(), "s4?".to_string(), "s5?".to_string()],
    );
    assert_eq!(merged.len(), 5);
    assert_eq!(merged[0], "What is corporate tax?");
    assert!(!merged.iter().any(|q| q == "what is corporate tax?"));
}

#[tokio::test]
async fn recommends_related_questions_in_rank_order() {
    let f = fixture().await;
    let query = "法人税の申告期限は？";
    let query_vec = unit(0);
    f.embedder.set_vector(query, query_vec.clone());

    // Two on-topic candidates at cosine ≈ 0.95 and ≈ 0.90 to the query.
    let near = blend(&unit(0), &unit(1), 0.95, 0.312);
    let nearer = blend(&unit(0), &unit(1), 0.98, 0.199);
    f.embedder.set_vector("申告に必要な書類は？", nearer.clone());
    f.embedder.set_vector("延長申請はできますか？", near.clone());

    seed_questions(
        &f,
        vec![
            ("申告に必要な書類は？", "ja", nearer),
            ("延長申請はできますか？", "ja", near),
        ],
    )
    .await;

    let gateway = EmbeddingGateway::new(Arc::clone(&f.embedder));
    let session = gateway.session();
    let follow_up = f
        .recommender
        .recommend(&session, &f.tenant, query, Language::Ja, 3)
        .await;

    assert_eq!(
        follow_up,
        vec!["申告に必要な書類は？", "延長申請はできますか？"]
    );
}

#[tokio::test]
async fn verification_rejects_off_topic_with_inflated_retrieval_score() {
    let f = fixture().await;
    let query = "法人税の申告期限は？";
    let query_vec = unit(0);
    f.embedder.set_vector(query, query_vec.clone());

    // Planted with the query's own vector in the index (retrieval score 1.0)
    // while the question text itself embeds orthogonally: re-verification
    // must drop it.
    f.embedder.set_vector("おすすめのレストランは？", unit(5));
    seed_questions(&f, vec![("おすすめのレストランは？", "ja", query_vec)]).await;

    let gateway = EmbeddingGateway::new(Arc::clone(&f.embedder));
    let session = gateway.session();
    let follow_up = f
        .recommender
        .recommend(&session, &f.tenant, query, Language::Ja, 3)
        .await;

    assert!(follow_up.is_empty());
}

#[tokio::test]
async fn filters_language_equality_and_question_mark() {
    let f = fixture().await;
    let query = "What is the filing deadline?";
    let query_vec = unit(0);
    f.embedder.set_vector(query, query_vec.clone());

    let on_topic = blend(&unit(0), &unit(1), 0.97, 0.243);
    for text in [
        "What is the filing deadline?",        // equals the query
        "申告期限はいつですか？",                 // wrong language
        "The deadline is in March",            // no question mark
        "Which documents are required?",       // survivor
    ] {
        f.embedder.set_vector(text, on_topic.clone());
    }

    seed_questions(
        &f,
        vec![
            ("What is the filing deadline?", "en", on_topic.clone()),
            ("申告期限はいつですか？", "ja", on_topic.clone()),
            ("The deadline is in March", "en", on_topic.clone()),
            ("Which documents are required?", "en", on_topic.clone()),
        ],
    )
    .await;

    let gateway = EmbeddingGateway::new(Arc::clone(&f.embedder));
    let session = gateway.session();
    let follow_up = f
        .recommender
        .recommend(&session, &f.tenant, query, Language::En, 3)
        .await;

    assert_eq!(follow_up, vec!["Which documents are required?"]);
}

#[tokio::test]
async fn missing_questions_collection_returns_empty() {
    let f = fixture().await;
    let gateway = EmbeddingGateway::new(Arc::clone(&f.embedder));
    let session = gateway.session();

    let follow_up = f
        .recommender
        .recommend(&session, &f.tenant, "anything?", Language::Zh, 3)
        .await;
    assert!(follow_up.is_empty());
}

#[tokio::test]
async fn limit_bounds_the_output() {
    let f = fixture().await;
    let query = "q?";
    f.embedder.set_vector(query, unit(0));

    let on_topic = blend(&unit(0), &unit(1), 0.97, 0.243);
    let mut records = Vec::new();
    for i in 0..6 {
        let text = format!("candidate {i}?");
        f.embedder.set_vector(text.clone(), on_topic.clone());
        records.push((text, "zh".to_string(), on_topic.clone()));
    }
    let record_refs: Vec<(&str, &str, Vec<f32>)> = records
        .iter()
        .map(|(q, l, v)| (q.as_str(), l.as_str(), v.clone()))
        .collect();
    seed_questions(&f, record_refs).await;

    let gateway = EmbeddingGateway::new(Arc::clone(&f.embedder));
    let session = gateway.session();
    let follow_up = f
        .recommender
        .recommend(&session, &f.tenant, query, Language::Zh, 2)
        .await;

    assert_eq!(follow_up.len(), 2);
}
