//! Wire payloads for the HTTP surface.

use serde::{Deserialize, Serialize};

use crate::generator::ChatTurn;
use crate::language::Language;
use crate::orchestrator::{ChatRequest, FinalAnswer};
use crate::retriever::Citation;

/// Body of the chat endpoints.
#[derive(Debug, Deserialize)]
pub struct ChatApiRequest {
    /// The user's question.
    pub query: String,
    /// Tenant share token or id. `kb_id` is accepted for older clients.
    #[serde(alias = "kb_id")]
    pub tenant_token: String,
    /// Prior turns, oldest first.
    #[serde(default)]
    pub conversation_history: Vec<ChatTurn>,
    /// Answer language.
    #[serde(default)]
    pub language: Language,
}

impl From<ChatApiRequest> for ChatRequest {
    fn from(request: ChatApiRequest) -> Self {
        ChatRequest {
            query: request.query,
            tenant_token: request.tenant_token,
            history: request.conversation_history,
            language: request.language,
        }
    }
}

/// Body of the non-streaming chat response.
#[derive(Debug, Serialize)]
pub struct ChatApiResponse {
    /// Always `"success"` on 200.
    pub status: &'static str,
    /// The answer text.
    pub answer: String,
    /// Retrieval context.
    pub context: String,
    /// Citations, at most five.
    pub citations: Vec<Citation>,
    /// Follow-up suggestions, at most three.
    pub follow_up: Vec<String>,
    /// Set when served from the semantic cache.
    pub cached: bool,
}

impl From<FinalAnswer> for ChatApiResponse {
    fn from(answer: FinalAnswer) -> Self {
        Self {
            status: "success",
            answer: answer.answer,
            context: answer.context,
            citations: answer.citations,
            follow_up: answer.follow_up,
            cached: answer.cached,
        }
    }
}

/// A streamed text delta.
#[derive(Debug, Serialize)]
pub struct ChunkEvent<'a> {
    /// The delta text.
    pub chunk: &'a str,
}

/// The terminal stream event.
#[derive(Debug, Serialize)]
pub struct FinalEvent {
    /// Full answer text.
    pub answer: String,
    /// Retrieval context.
    pub context: String,
    /// Citations.
    pub citations: Vec<Citation>,
    /// Follow-up suggestions.
    pub follow_up: Vec<String>,
    /// Set when served from the semantic cache.
    pub cached: bool,
    /// Always `true`.
    pub done: bool,
}

impl From<FinalAnswer> for FinalEvent {
    fn from(answer: FinalAnswer) -> Self {
        Self {
            answer: answer.answer,
            context: answer.context,
            citations: answer.citations,
            follow_up: answer.follow_up,
            cached: answer.cached,
            done: true,
        }
    }
}

/// A terminal stream error.
#[derive(Debug, Serialize)]
pub struct StreamErrorEvent<'a> {
    /// Localized message.
    pub error: &'a str,
    /// Always `true`.
    pub done: bool,
}

/// Body of the frequent-questions and chat-config endpoints.
#[derive(Debug, Deserialize)]
pub struct TenantScopedRequest {
    /// Tenant share token or id.
    #[serde(alias = "kb_id")]
    pub tenant_token: String,
    /// Target language.
    #[serde(default)]
    pub language: Language,
}

/// Response of the frequent-questions endpoint.
#[derive(Debug, Serialize)]
pub struct FrequentQuestionsResponse {
    /// Always `"success"` on 200.
    pub status: &'static str,
    /// Three onboarding questions.
    pub questions: Vec<String>,
    /// Whether the triple came from the in-process cache.
    pub cached: bool,
}

/// Response of the chat-config endpoint.
#[derive(Debug, Serialize)]
pub struct ChatConfigResponse {
    /// Always `"success"` on 200.
    pub status: &'static str,
    /// Display name.
    pub project_name: String,
    /// Avatar image URL.
    pub avatar_url: String,
    /// Welcome message.
    pub welcome_message: String,
    /// Onboarding questions, at most three.
    pub recommended_questions: Vec<String>,
}
