use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::vectorstore::VectorStoreError;

/// Errors raised on the retrieval path.
#[derive(Debug, Error)]
pub enum RetrieveError {
    /// Embedding the query failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// The vector backend failed.
    #[error(transparent)]
    Store(#[from] VectorStoreError),
}
