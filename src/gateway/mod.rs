//! HTTP surface: streaming and non-streaming answers, frequent questions,
//! and chat configuration.

pub mod error;
pub mod payload;
pub mod state;

#[cfg(test)]
mod tests;

pub use error::GatewayError;
pub use state::AppState;

use std::convert::Infallible;

use axum::http::{HeaderName, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router, extract::State};
use futures_util::StreamExt;
use futures_util::stream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, instrument};

use crate::cache::AnswerStore;
use crate::embedding::Embedder;
use crate::orchestrator::ChatEvent;
use crate::vectorstore::VectorStore;

use payload::{
    ChatApiRequest, ChatApiResponse, ChatConfigResponse, ChunkEvent, FinalEvent,
    FrequentQuestionsResponse, StreamErrorEvent, TenantScopedRequest,
};

/// Builds the service router.
pub fn create_router<V, E, A>(state: AppState<V, E, A>) -> Router
where
    V: VectorStore + 'static,
    E: Embedder + 'static,
    A: AnswerStore + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat-stream", post(chat_stream_handler::<V, E, A>))
        .route("/api/chat", post(chat_handler::<V, E, A>))
        .route(
            "/api/frequent-questions",
            post(frequent_questions_handler::<V, E, A>),
        )
        .route("/api/chat-config", post(chat_config_handler::<V, E, A>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn sse_json<T: serde::Serialize>(payload: &T) -> Event {
    match serde_json::to_string(payload) {
        Ok(json) => Event::default().data(json),
        Err(e) => {
            error!(error = %e, "failed to serialize SSE payload");
            Event::default().comment("serialization-error")
        }
    }
}

/// Streaming answers as server-sent events: `{"chunk": …}` deltas, one
/// terminal `{…, "done": true}` object, then a literal `[DONE]`.
#[instrument(skip(state, request), fields(tenant = %request.tenant_token))]
async fn chat_stream_handler<V, E, A>(
    State(state): State<AppState<V, E, A>>,
    Json(request): Json<ChatApiRequest>,
) -> Result<Response, GatewayError>
where
    V: VectorStore + 'static,
    E: Embedder + 'static,
    A: AnswerStore + 'static,
{
    let events = state.service.clone().answer_stream(request.into())?;

    let sse_events = events
        .map(|event| {
            Ok::<Event, Infallible>(match event {
                ChatEvent::Delta(chunk) => sse_json(&ChunkEvent { chunk: &chunk }),
                ChatEvent::Final(answer) => sse_json(&FinalEvent::from(answer)),
                ChatEvent::Error { message } => sse_json(&StreamErrorEvent {
                    error: &message,
                    done: true,
                }),
            })
        })
        .chain(stream::iter([Ok(Event::default().data("[DONE]"))]));

    let sse = Sse::new(sse_events).keep_alive(KeepAlive::default());

    // Intermediary buffering defeats streaming; tell proxies to pass chunks
    // through as they arrive.
    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        sse,
    )
        .into_response())
}

/// Non-streaming answers: one JSON object.
#[instrument(skip(state, request), fields(tenant = %request.tenant_token))]
async fn chat_handler<V, E, A>(
    State(state): State<AppState<V, E, A>>,
    Json(request): Json<ChatApiRequest>,
) -> Result<Json<ChatApiResponse>, GatewayError>
where
    V: VectorStore + 'static,
    E: Embedder + 'static,
    A: AnswerStore + 'static,
{
    let answer = state.service.clone().answer(request.into()).await?;
    Ok(Json(answer.into()))
}

async fn frequent_questions_handler<V, E, A>(
    State(state): State<AppState<V, E, A>>,
    Json(request): Json<TenantScopedRequest>,
) -> Result<Json<FrequentQuestionsResponse>, GatewayError>
where
    V: VectorStore + 'static,
    E: Embedder + 'static,
    A: AnswerStore + 'static,
{
    let (questions, cached) = state
        .service
        .frequent_questions(&request.tenant_token, request.language)
        .await?;

    Ok(Json(FrequentQuestionsResponse {
        status: "success",
        questions,
        cached,
    }))
}

async fn chat_config_handler<V, E, A>(
    State(state): State<AppState<V, E, A>>,
    Json(request): Json<TenantScopedRequest>,
) -> Result<Json<ChatConfigResponse>, GatewayError>
where
    V: VectorStore + 'static,
    E: Embedder + 'static,
    A: AnswerStore + 'static,
{
    let config = state
        .service
        .chat_config(&request.tenant_token, request.language)
        .await?;

    Ok(Json(ChatConfigResponse {
        status: "success",
        project_name: config.project_name,
        avatar_url: config.avatar_url,
        welcome_message: config.welcome_message,
        recommended_questions: config.recommended_questions,
    }))
}
