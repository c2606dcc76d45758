use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use super::{AppState, create_router};
use crate::cache::MemoryAnswerStore;
use crate::embedding::StubEmbedder;
use crate::llm::ChatClient;
use crate::orchestrator::{ChatService, ServiceSettings};
use crate::tenant::{Tenant, TenantDirectory};
use crate::vectorstore::{DiskVectorStore, VectorRecord, VectorStore};

const DIM: usize = 32;

struct Harness {
    _dir: TempDir,
    router: Router,
    store: Arc<DiskVectorStore>,
    embedder: Arc<StubEmbedder>,
}

async fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(DiskVectorStore::open(dir.path()).await.unwrap());
    let embedder = Arc::new(StubEmbedder::new(DIM));

    let tenants = Arc::new(TenantDirectory::new());
    let mut tenant = Tenant::new("kb-1", "tok-1", "kb1");
    tenant.project_name = "Tax KB".to_string();
    tenant.welcome_message = "Ask me about filings.".to_string();
    tenants.insert(tenant).unwrap();

    let service = Arc::new(ChatService::new(
        tenants,
        Arc::clone(&store),
        Arc::clone(&embedder),
        Arc::new(MemoryAnswerStore::new()),
        ChatClient::new_mock("test-model"),
        ChatClient::new_mock("helper-model"),
        ServiceSettings::default(),
    ));

    Harness {
        _dir: dir,
        router: create_router(AppState::new(service)),
        store,
        embedder,
    }
}

async fn seed_chunks(h: &Harness, query: &str) {
    let mut vector = vec![0.0; DIM];
    vector[0] = 1.0;
    h.embedder.set_vector(query, vector.clone());

    h.store.get_or_create("kb1", DIM).await.unwrap();
    h.store
        .upsert(
            "kb1",
            vec![VectorRecord::new(
                "kb1_0",
                vector,
                json!({
                    "text": format!("Filing details. {}", "The deadline is two months out. ".repeat(5)),
                    "source": "guide.pdf",
                }),
            )],
        )
        .await
        .unwrap();
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_responds() {
    let h = harness().await;
    let response = h
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn chat_returns_answer_citations_and_follow_up_fields() {
    let h = harness().await;
    let query = "When is the filing deadline?";
    seed_chunks(&h, query).await;

    let response = h
        .router
        .clone()
        .oneshot(post(
            "/api/chat",
            json!({"query": query, "tenant_token": "tok-1", "language": "en"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert!(!body["answer"].as_str().unwrap().is_empty());
    assert!(body["citations"].as_array().unwrap().len() <= 5);
    assert!(body["follow_up"].as_array().unwrap().len() <= 3);
}

#[tokio::test]
async fn chat_accepts_the_legacy_kb_id_field() {
    let h = harness().await;
    let query = "When is the filing deadline?";
    seed_chunks(&h, query).await;

    let response = h
        .router
        .clone()
        .oneshot(post(
            "/api/chat",
            json!({"query": query, "kb_id": "tok-1", "language": "en"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_tenant_maps_to_404() {
    let h = harness().await;
    let response = h
        .router
        .clone()
        .oneshot(post(
            "/api/chat",
            json!({"query": "q?", "tenant_token": "missing"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_query_maps_to_400() {
    let h = harness().await;
    let response = h
        .router
        .clone()
        .oneshot(post(
            "/api/chat",
            json!({"query": "  ", "tenant_token": "tok-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_stream_emits_sse_with_terminal_done() {
    let h = harness().await;
    let query = "When is the filing deadline?";
    seed_chunks(&h, query).await;

    let response = h
        .router
        .clone()
        .oneshot(post(
            "/api/chat-stream",
            json!({"query": query, "tenant_token": "tok-1", "language": "en"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
    assert_eq!(response.headers().get("x-accel-buffering").unwrap(), "no");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(text.contains("\"chunk\""));
    assert!(text.contains("\"done\":true"));
    assert!(text.trim_end().ends_with("data: [DONE]"));
}

#[tokio::test]
async fn frequent_questions_returns_a_triple() {
    let h = harness().await;
    h.store.get_or_create("kb1", DIM).await.unwrap();

    let response = h
        .router
        .clone()
        .oneshot(post(
            "/api/frequent-questions",
            json!({"tenant_token": "tok-1", "language": "en"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["questions"].as_array().unwrap().len(), 3);
    assert_eq!(body["cached"], false);
}

#[tokio::test]
async fn chat_config_carries_tenant_fields() {
    let h = harness().await;
    h.store.get_or_create("kb1", DIM).await.unwrap();

    let response = h
        .router
        .clone()
        .oneshot(post(
            "/api/chat-config",
            json!({"tenant_token": "tok-1", "language": "en"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["project_name"], "Tax KB");
    assert_eq!(body["welcome_message"], "Ask me about filings.");
    assert!(body["recommended_questions"].as_array().unwrap().len() <= 3);
}
