use thiserror::Error;

use crate::embedding::EmbeddingError;

/// Errors returned by answer-cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Embedding the question failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// The backing store failed.
    #[error("answer store failed: {message}")]
    Store {
        /// Error message.
        message: String,
    },
}
