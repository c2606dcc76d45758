use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::llm::LlmError;
use crate::vectorstore::VectorStoreError;

/// Errors raised during ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Embedding failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// The vector backend failed.
    #[error(transparent)]
    Store(#[from] VectorStoreError),

    /// Question generation failed.
    #[error(transparent)]
    Llm(#[from] LlmError),
}
