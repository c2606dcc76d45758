//! Language-model client.
//!
//! One `genai` client serves every chat call: grounded generation, query
//! expansion, and question generation. A mock mode produces deterministic
//! output so tests and offline development never reach a provider.

pub mod error;
pub mod json;

pub use error::LlmError;

use std::pin::Pin;

use futures_util::stream::{Stream, StreamExt};
use genai::Client;
use genai::chat::{ChatMessage, ChatRequest, ChatStreamEvent};
use tracing::error;

/// Stream of answer text deltas.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

const MOCK_ANSWER: &str = "This is a mock answer grounded in the provided context.";

/// Shared chat-model client.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    model: String,
    mock: bool,
}

impl ChatClient {
    /// Creates a client for `model`. Provider resolution and credentials are
    /// handled by `genai` from the environment.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::default(),
            model: model.into(),
            mock: false,
        }
    }

    /// Creates a client that never calls a provider and produces canned
    /// output instead.
    pub fn new_mock(model: impl Into<String>) -> Self {
        Self {
            client: Client::default(),
            model: model.into(),
            mock: true,
        }
    }

    /// Returns a copy of this client targeting a different model.
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            client: self.client.clone(),
            model: model.into(),
            mock: self.mock,
        }
    }

    /// The configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns `true` when running against the mock provider.
    pub fn is_mock(&self) -> bool {
        self.mock
    }

    /// Single-shot completion for helper prompts (expansion, question
    /// generation).
    pub async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        if self.mock {
            return Ok(MOCK_ANSWER.to_string());
        }

        let request = ChatRequest::new(vec![ChatMessage::user(prompt)]);
        let response = self
            .client
            .exec_chat(&self.model, request, None)
            .await
            .map_err(|e| LlmError::Provider {
                message: e.to_string(),
            })?;

        Ok(response.first_text().unwrap_or_default().to_string())
    }

    /// Streaming chat completion. Yields non-empty text deltas until the
    /// provider stream ends.
    pub async fn stream(&self, messages: Vec<ChatMessage>) -> Result<DeltaStream, LlmError> {
        if self.mock {
            let chunks: Vec<Result<String, LlmError>> = MOCK_ANSWER
                .split_inclusive(' ')
                .map(|part| Ok(part.to_string()))
                .collect();
            let stream: DeltaStream = Box::pin(futures_util::stream::iter(chunks));
            return Ok(stream);
        }

        let request = ChatRequest::new(messages);
        let response = self
            .client
            .exec_chat_stream(&self.model, request, None)
            .await
            .map_err(|e| {
                error!(error = %e, "provider stream init failed");
                LlmError::Provider {
                    message: e.to_string(),
                }
            })?;

        let deltas = response.stream.filter_map(|event| async move {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) if !chunk.content.is_empty() => {
                    Some(Ok(chunk.content))
                }
                Ok(_) => None,
                Err(e) => Some(Err(LlmError::Provider {
                    message: e.to_string(),
                })),
            }
        });

        let stream: DeltaStream = Box::pin(deltas);
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn mock_stream_yields_deltas_that_rebuild_the_answer() {
        let client = ChatClient::new_mock("test-model");
        let mut stream = client.stream(vec![]).await.unwrap();

        let mut answer = String::new();
        let mut deltas = 0;
        while let Some(delta) = stream.next().await {
            answer.push_str(&delta.unwrap());
            deltas += 1;
        }

        assert!(deltas > 1);
        assert_eq!(answer, MOCK_ANSWER);
    }

    #[tokio::test]
    async fn mock_complete_is_deterministic() {
        let client = ChatClient::new_mock("test-model");
        assert_eq!(client.complete("anything").await.unwrap(), MOCK_ANSWER);
    }
}
