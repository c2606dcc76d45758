use thiserror::Error;

/// Errors returned by embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The embedding API call failed.
    #[error("embedding request failed: {message}")]
    RequestFailed {
        /// Error message from the client.
        message: String,
    },

    /// The API returned fewer vectors than texts submitted.
    #[error("embedding response incomplete: expected {expected} vectors, got {actual}")]
    IncompleteResponse {
        /// Number of texts submitted.
        expected: usize,
        /// Number of vectors returned.
        actual: usize,
    },

    /// A returned vector had the wrong dimension.
    #[error("invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidDimension {
        /// Configured dimension.
        expected: usize,
        /// Returned dimension.
        actual: usize,
    },
}
