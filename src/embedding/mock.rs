//! Deterministic embedder for tests and offline development.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use super::{Embedder, EmbeddingError};

/// Embedder producing stable pseudo-random unit vectors derived from the
/// text. Identical texts map to identical vectors; unrelated texts land
/// nearly orthogonal. Tests that need a specific similarity can plant
/// explicit vectors with [`StubEmbedder::set_vector`].
pub struct StubEmbedder {
    dimension: usize,
    overrides: RwLock<HashMap<String, Vec<f32>>>,
    failing: AtomicBool,
    calls: AtomicU64,
}

impl StubEmbedder {
    /// Creates a stub producing `dimension`-sized vectors.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            overrides: RwLock::new(HashMap::new()),
            failing: AtomicBool::new(false),
            calls: AtomicU64::new(0),
        }
    }

    /// Pins the vector returned for an exact text.
    pub fn set_vector(&self, text: impl Into<String>, vector: Vec<f32>) {
        self.overrides.write().insert(text.into(), vector);
    }

    /// Makes every call fail until reset; used to exercise advisory-tier
    /// degradation.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Total number of embedding API calls (query or batch) so far.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.overrides.read().get(text) {
            return v.clone();
        }

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish() | 1;

        let mut vector = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            // xorshift64
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            vector.push((state as f64 / u64::MAX as f64) as f32 - 0.5);
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    fn check_failing(&self) -> Result<(), EmbeddingError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbeddingError::RequestFailed {
                message: "stub embedder set to fail".to_string(),
            });
        }
        Ok(())
    }
}

impl Embedder for StubEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.check_failing()?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.check_failing()?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
