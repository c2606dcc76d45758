use thiserror::Error;

use crate::ingest::IngestError;
use crate::qa::QaError;
use crate::vectorstore::VectorStoreError;

/// Errors surfaced by the orchestrator before or instead of a stream.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The tenant token resolved to nothing.
    #[error("unknown tenant token")]
    UnknownTenant,

    /// The request carried no query text.
    #[error("empty query")]
    EmptyQuery,

    /// The vector backend failed on an essential path.
    #[error(transparent)]
    Store(#[from] VectorStoreError),

    /// Ingestion failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Curated-QA lifecycle failed.
    #[error(transparent)]
    Qa(#[from] QaError),

    /// Generation failed before producing a terminal event.
    #[error("generation failed: {message}")]
    Generation {
        /// Localized user-facing message.
        message: String,
    },
}
