//! Request-scoped embedding memoization.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use super::{Embedder, EmbeddingError};

/// A request-scoped view over the shared embedding client.
///
/// `embed_query` consults a per-request memo before calling the model; within
/// one query the same user text is embedded up to four times (cache lookup,
/// QA match, retrieval, follow-up expansion), and the memo collapses those
/// into one API call. The memo dies with the session; it is never shared
/// across requests. Failed calls do not pollute the memo.
pub struct EmbeddingSession<E> {
    client: Arc<E>,
    memo: Mutex<HashMap<String, Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<E: Embedder> EmbeddingSession<E> {
    pub(super) fn new(client: Arc<E>) -> Self {
        Self {
            client,
            memo: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Embeds a query text, reusing the memoized vector when available.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if let Some(vector) = self.memo.lock().get(text).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(vector);
        }

        let vector = self.client.embed_query(text).await?;
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.memo.lock().insert(text.to_string(), vector.clone());
        Ok(vector)
    }

    /// Embeds a batch of texts. Batches bypass the memo: a batch is one API
    /// call already.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.client.embed_batch(texts).await
    }

    /// Vector dimension of the underlying model.
    pub fn dimension(&self) -> usize {
        self.client.dimension()
    }

    /// Memo `(hits, misses)` counters for this request.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// Logs the memo counters at the end of a request.
    pub fn log_stats(&self) {
        let (hits, misses) = self.stats();
        if hits > 0 || misses > 0 {
            debug!(hits, misses, "embedding memo stats");
        }
    }
}
