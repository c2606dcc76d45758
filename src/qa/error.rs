use thiserror::Error;

use crate::cache::CacheError;
use crate::embedding::EmbeddingError;
use crate::vectorstore::VectorStoreError;

/// Errors raised by curated-QA operations.
#[derive(Debug, Error)]
pub enum QaError {
    /// Embedding failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// The vector backend failed.
    #[error(transparent)]
    Store(#[from] VectorStoreError),

    /// The answer cache failed during invalidation.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The QA had no usable question text.
    #[error("curated QA '{qa_id}' has no non-empty question")]
    EmptyQuestion {
        /// The offending QA id.
        qa_id: String,
    },
}
