//! # kbchat
//!
//! Retrieval-augmented question answering over tenant knowledge bases.
//!
//! Each tenant owns one vector collection of document chunks plus two derived
//! collections (`{collection}_qa` for curated question/answer pairs and
//! `{collection}_questions` for pre-generated recommended questions). A query
//! runs through a cascade:
//!
//! ```text
//! Request → Answer cache (semantic) → Curated QA → Retrieve + Generate → Follow-up
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use kbchat::Config;
//!
//! # fn run() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! println!("Listening on {}", config.socket_addr());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Purpose |
//! |---------|---------|
//! | `mock` | Deterministic embedder + provider mocks for tests/examples |
//!
//! ## Modules
//!
//! - [`cache`] - Semantic answer cache (question meaning → cached answer)
//! - [`config`] - Environment-backed configuration
//! - [`embedding`] - Embedding gateway with request-scoped memoization
//! - [`followup`] - Follow-up question recommendation
//! - [`gateway`] - HTTP surface (SSE streaming + JSON endpoints)
//! - [`generator`] - Grounded, language-aware answer generation
//! - [`ingest`] - Document chunking/indexing and question seeding
//! - [`orchestrator`] - The per-query cascade
//! - [`qa`] - Curated QA matching and lifecycle
//! - [`questions`] - Frequent-questions builder (onboarding suggestions)
//! - [`retriever`] - Passage retrieval with citation assembly
//! - [`vectorstore`] - Vector backend adapter (pgvector + on-disk fallback)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cache;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod followup;
pub mod gateway;
pub mod generator;
pub mod ingest;
pub mod language;
pub mod llm;
pub mod orchestrator;
pub mod qa;
pub mod questions;
pub mod retriever;
pub mod tenant;
pub mod vectorstore;

pub use cache::{AnswerCache, AnswerEntry, AnswerStore, CachedAnswer, MemoryAnswerStore};
pub use config::{Config, ConfigError};
pub use embedding::{Embedder, EmbeddingError, EmbeddingGateway, EmbeddingSession, HttpEmbedder};
#[cfg(any(test, feature = "mock"))]
pub use embedding::StubEmbedder;
pub use followup::FollowUpRecommender;
pub use generator::{ChatTurn, Generator, Role};
pub use ingest::{Document, Ingestor};
pub use language::Language;
pub use llm::{ChatClient, LlmError};
pub use orchestrator::{ChatError, ChatEvent, ChatRequest, ChatService, FinalAnswer};
pub use qa::{QaMatch, QaService};
pub use questions::FrequentQuestions;
pub use retriever::{Citation, Retriever};
pub use tenant::{Tenant, TenantDirectory};
pub use vectorstore::{
    DiskVectorStore, PgVectorStore, QueryMatch, VectorRecord, VectorStore, VectorStoreError,
    cosine_similarity, qa_collection, questions_collection, validate_collection_name,
};
