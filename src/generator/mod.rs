//! Grounded, language-aware answer generation.
//!
//! The generator renders a per-language system prompt embedding the retrieval
//! context and streams the model's answer. When the context is too short to
//! answer from, it short-circuits to a localized "no information" reply
//! without spending a provider call.

use genai::chat::ChatMessage;
use serde::{Deserialize, Serialize};

use crate::constants::MIN_CHUNK_CHARS;
use crate::language::Language;
use crate::llm::{ChatClient, DeltaStream, LlmError};

/// Conversation roles accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End-user turn.
    User,
    /// Prior model turn.
    Assistant,
}

/// One turn of conversation history. The last turn is the current question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who spoke.
    pub role: Role,
    /// What was said.
    pub content: String,
}

impl ChatTurn {
    /// A user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// An assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Streaming answer generator.
pub struct Generator {
    chat: ChatClient,
}

impl Generator {
    /// Creates a generator over the shared chat client.
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }

    fn build_messages(history: &[ChatTurn], context: &str, language: Language) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(language.system_prompt(context)));
        for turn in history {
            messages.push(match turn.role {
                Role::User => ChatMessage::user(turn.content.clone()),
                Role::Assistant => ChatMessage::assistant(turn.content.clone()),
            });
        }
        messages
    }

    /// Streams an answer grounded in `context`.
    pub async fn stream_answer(
        &self,
        history: &[ChatTurn],
        context: &str,
        language: Language,
    ) -> Result<DeltaStream, LlmError> {
        if context.trim().chars().count() < MIN_CHUNK_CHARS {
            let reply: Vec<Result<String, LlmError>> =
                vec![Ok(language.no_information_reply().to_string())];
            let stream: DeltaStream = Box::pin(futures_util::stream::iter(reply));
            return Ok(stream);
        }

        let messages = Self::build_messages(history, context, language);
        self.chat.stream(messages).await
    }
}
