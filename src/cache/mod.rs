//! Semantic answer cache.
//!
//! Recent `(question meaning → answer)` bindings, scoped per tenant and
//! language. The similarity threshold is deliberately high (0.95 by
//! default): the cache only catches near-paraphrases, so any meaningful
//! change in user intent bypasses it. Cached questions live in their own
//! index, separate from document chunks, so they never inflate retrieval
//! noise.

pub mod error;
pub mod store;

#[cfg(test)]
mod tests;

pub use error::CacheError;
pub use store::{AnswerStore, MemoryAnswerStore, PgAnswerStore};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::constants::DETACHED_WRITE_GRACE_MS;
use crate::embedding::{Embedder, EmbeddingSession};
use crate::language::Language;
use crate::retriever::Citation;

/// The cached payload returned on a hit.
#[derive(Debug, Clone, Default)]
pub struct CachedAnswer {
    /// The answer text.
    pub answer: String,
    /// Retrieval context the answer was grounded in.
    pub context: String,
    /// Citations attached to the answer.
    pub citations: Vec<Citation>,
    /// Follow-up suggestions computed for the answer.
    pub follow_up: Vec<String>,
}

/// A stored cache entry.
#[derive(Debug, Clone)]
pub struct AnswerEntry {
    /// Entry id.
    pub id: Uuid,
    /// Owning tenant id.
    pub tenant: String,
    /// The cached question text.
    pub question: String,
    /// Embedding of the question.
    pub embedding: Vec<f32>,
    /// The answer text.
    pub answer: String,
    /// Retrieval context.
    pub context: String,
    /// Citations.
    pub citations: Vec<Citation>,
    /// Follow-up suggestions.
    pub follow_up: Vec<String>,
    /// Request language the entry serves.
    pub language: Language,
    /// Expiry instant; entries at or past it never hit.
    pub expires_at: DateTime<Utc>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Number of lookups served by this entry.
    pub hit_count: i64,
}

/// A store lookup result before threshold filtering.
#[derive(Debug, Clone)]
pub struct CacheHit {
    /// Entry id (for hit counting).
    pub id: Uuid,
    /// Cosine similarity of the stored question to the lookup question.
    pub score: f32,
    /// The cached payload.
    pub answer: CachedAnswer,
}

/// Semantic answer cache over an [`AnswerStore`].
pub struct AnswerCache<A> {
    store: Arc<A>,
    enabled: bool,
    threshold: f32,
    ttl_hours: i64,
}

impl<A> Clone for AnswerCache<A> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            enabled: self.enabled,
            threshold: self.threshold,
            ttl_hours: self.ttl_hours,
        }
    }
}

impl<A: AnswerStore + 'static> AnswerCache<A> {
    /// Creates a cache with the given hit threshold and entry TTL.
    pub fn new(store: Arc<A>, enabled: bool, threshold: f32, ttl_hours: i64) -> Self {
        Self {
            store,
            enabled,
            threshold,
            ttl_hours,
        }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<A> {
        &self.store
    }

    /// Looks up a cached answer using the default threshold.
    pub async fn check<E: Embedder>(
        &self,
        session: &EmbeddingSession<E>,
        tenant: &str,
        question: &str,
        language: Language,
    ) -> Result<Option<CachedAnswer>, CacheError> {
        self.check_with_threshold(session, tenant, question, language, self.threshold)
            .await
    }

    /// Looks up a cached answer with an explicit similarity threshold.
    ///
    /// On a hit the entry's counter is bumped on a detached task so the
    /// response path never waits on the write.
    #[instrument(skip(self, session, question), fields(tenant = tenant, language = %language))]
    pub async fn check_with_threshold<E: Embedder>(
        &self,
        session: &EmbeddingSession<E>,
        tenant: &str,
        question: &str,
        language: Language,
        threshold: f32,
    ) -> Result<Option<CachedAnswer>, CacheError> {
        if !self.enabled {
            return Ok(None);
        }

        let vector = session.embed_query(question).await?;
        let hit = self
            .store
            .top1(tenant, language, &vector, Utc::now())
            .await?;

        match hit {
            Some(hit) if hit.score >= threshold => {
                info!(score = hit.score, "answer cache hit");

                let store = Arc::clone(&self.store);
                let id = hit.id;
                tokio::spawn(async move {
                    if let Err(e) = store.bump_hits(id).await {
                        warn!(error = %e, "failed to bump cache hit count");
                    }
                });

                Ok(Some(hit.answer))
            }
            Some(hit) => {
                debug!(score = hit.score, threshold, "closest cache entry below threshold");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Inserts an entry synchronously. `ttl_hours` overrides the configured
    /// TTL when given.
    pub async fn save(
        &self,
        tenant: &str,
        question: &str,
        embedding: Vec<f32>,
        payload: CachedAnswer,
        language: Language,
        ttl_hours: Option<i64>,
    ) -> Result<(), CacheError> {
        if !self.enabled {
            return Ok(());
        }

        let now = Utc::now();
        let ttl = ttl_hours.unwrap_or(self.ttl_hours);
        let entry = AnswerEntry {
            id: Uuid::new_v4(),
            tenant: tenant.to_string(),
            question: question.to_string(),
            embedding,
            answer: payload.answer,
            context: payload.context,
            citations: payload.citations,
            follow_up: payload.follow_up,
            language,
            expires_at: now + ChronoDuration::hours(ttl),
            created_at: now,
            hit_count: 0,
        };
        self.store.insert(entry).await
    }

    /// Inserts an entry on a detached task, bounded by a short grace period.
    /// Write failures are logged and dropped; they never reach the response
    /// path.
    pub fn save_detached(
        &self,
        tenant: &str,
        question: &str,
        embedding: Vec<f32>,
        payload: CachedAnswer,
        language: Language,
    ) {
        if !self.enabled {
            return;
        }

        let cache = self.clone();
        let tenant = tenant.to_string();
        let question = question.to_string();
        tokio::spawn(async move {
            let write = cache.save(&tenant, &question, embedding, payload, language, None);
            match tokio::time::timeout(Duration::from_millis(DETACHED_WRITE_GRACE_MS), write).await
            {
                Ok(Ok(())) => debug!(tenant = %tenant, "answer cached"),
                Ok(Err(e)) => warn!(error = %e, "failed to save answer cache entry"),
                Err(_) => warn!("answer cache write timed out"),
            }
        });
    }

    /// Removes every entry for a tenant. Called when the corpus changes.
    pub async fn clear(&self, tenant: &str) -> Result<u64, CacheError> {
        let removed = self.store.clear_tenant(tenant).await?;
        info!(tenant, removed, "cleared answer cache");
        Ok(removed)
    }

    /// Removes entries whose answer equals a curated answer exactly. Called
    /// whenever a curated QA is edited or deleted: the canonical question and
    /// every paraphrase share the same answer, so one pass purges them all.
    pub async fn clear_by_answer(&self, tenant: &str, answer: &str) -> Result<u64, CacheError> {
        let removed = self.store.clear_by_answer(tenant, answer).await?;
        debug!(tenant, removed, "purged cache entries by answer");
        Ok(removed)
    }

    /// Removes expired entries; intended for a periodic maintenance task.
    pub async fn purge_expired(&self) -> Result<u64, CacheError> {
        self.store.purge_expired(Utc::now()).await
    }
}
