//! Embedding gateway: one entry point for all text→vector calls.
//!
//! A single model client is shared process-wide. Each request opens an
//! [`EmbeddingSession`] carrying a request-scoped memo so the same user text
//! is embedded at most once per request, no matter how many tiers consult it.
//! Batch calls are one API call by definition and never touch the memo.

pub mod error;
pub mod http;
pub mod memo;
#[cfg(any(test, feature = "mock"))]
pub mod mock;


pub use error::EmbeddingError;
pub use http::HttpEmbedder;
pub use memo::EmbeddingSession;
#[cfg(any(test, feature = "mock"))]
pub use mock::StubEmbedder;

use std::sync::Arc;

/// Minimal async interface over an embedding model.
pub trait Embedder: Send + Sync {
    /// Embeds a single query text.
    fn embed_query(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, EmbeddingError>> + Send;

    /// Embeds a batch of texts in one API call.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, EmbeddingError>> + Send;

    /// The dimension of vectors produced by this model.
    fn dimension(&self) -> usize;
}

/// Process-wide handle over the shared embedding client.
pub struct EmbeddingGateway<E> {
    client: Arc<E>,
}

impl<E> Clone for EmbeddingGateway<E> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl<E: Embedder> EmbeddingGateway<E> {
    /// Wraps a shared client.
    pub fn new(client: Arc<E>) -> Self {
        Self { client }
    }

    /// Opens a request-scoped session with its own memo.
    pub fn session(&self) -> EmbeddingSession<E> {
        EmbeddingSession::new(Arc::clone(&self.client))
    }

    /// Embeds a batch outside any request scope (ingestion paths).
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.client.embed_batch(texts).await
    }

    /// Vector dimension of the underlying model.
    pub fn dimension(&self) -> usize {
        self.client.dimension()
    }
}
