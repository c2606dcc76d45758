use thiserror::Error;

/// Errors returned by vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// Could not connect to the backend.
    #[error("failed to connect to vector backend at '{url}': {message}")]
    ConnectionFailed {
        /// Backend URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// Collection name failed validation. Raised before any I/O.
    #[error("invalid collection name: '{name}'")]
    InvalidCollectionName {
        /// The offending name.
        name: String,
    },

    /// Collection does not exist.
    #[error("collection not found: {collection}")]
    CollectionNotFound {
        /// Collection name.
        collection: String,
    },

    /// Collection creation failed.
    #[error("failed to create collection '{collection}': {message}")]
    CreateFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },

    /// Upsert failed.
    #[error("failed to upsert records into '{collection}': {message}")]
    UpsertFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },

    /// Query failed.
    #[error("failed to query '{collection}': {message}")]
    QueryFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },

    /// Delete failed.
    #[error("failed to delete from '{collection}': {message}")]
    DeleteFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },

    /// Vector dimension mismatch.
    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// On-disk persistence failed.
    #[error("failed to persist collection '{collection}': {message}")]
    PersistFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },
}
