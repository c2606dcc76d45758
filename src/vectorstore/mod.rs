//! Vector backend adapter.
//!
//! All higher tiers talk to a [`VectorStore`]; nothing above this module
//! branches on which backend is in use. The reference backend is Postgres
//! with the pgvector extension; an on-disk store serves as the local
//! fallback and the test backend.

pub mod disk;
pub mod error;
pub mod model;
pub mod pgvector;


pub use disk::DiskVectorStore;
pub use error::VectorStoreError;
pub use model::{QueryMatch, VectorRecord, cosine_similarity, strip_nulls};
pub use pgvector::PgVectorStore;

/// Validates a base collection name against `^[A-Za-z0-9_-]+$`.
///
/// Collection names end up inside SQL identifiers and record id prefixes, so
/// anything else is a hard error surfaced before any side effect.
pub fn validate_collection_name(name: &str) -> Result<(), VectorStoreError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(VectorStoreError::InvalidCollectionName {
            name: name.to_string(),
        })
    }
}

/// Derived collection holding a tenant's curated QA vectors.
pub fn qa_collection(base: &str) -> String {
    format!("{base}_qa")
}

/// Derived collection holding a tenant's recommended-question vectors.
pub fn questions_collection(base: &str) -> String {
    format!("{base}_questions")
}

/// Minimal async interface over a vector backend.
pub trait VectorStore: Send + Sync {
    /// Ensures a collection exists with the given vector dimension.
    fn get_or_create(
        &self,
        name: &str,
        dimension: usize,
    ) -> impl std::future::Future<Output = Result<(), VectorStoreError>> + Send;

    /// Upserts records. Existing ids are overwritten.
    fn upsert(
        &self,
        name: &str,
        records: Vec<VectorRecord>,
    ) -> impl std::future::Future<Output = Result<(), VectorStoreError>> + Send;

    /// Returns the top-`k` records by cosine similarity, best first.
    fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
    ) -> impl std::future::Future<Output = Result<Vec<QueryMatch>, VectorStoreError>> + Send;

    /// Deletes every record whose id starts with `prefix`.
    fn delete_by_id_prefix(
        &self,
        name: &str,
        prefix: &str,
    ) -> impl std::future::Future<Output = Result<u64, VectorStoreError>> + Send;

    /// Drops a collection and all its records.
    fn delete_collection(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<(), VectorStoreError>> + Send;

    /// Number of records in a collection.
    fn count(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<usize, VectorStoreError>> + Send;
}
