//! Follow-up question recommendation.
//!
//! After an answer, up to three pre-generated questions from the tenant's
//! `{collection}_questions` index are offered as next steps. Retrieval is
//! widened by query expansion, then every candidate is re-verified against
//! the *original* query embedding — expansion improves recall, verification
//! keeps precision. Empty output is valid and common for tenants that never
//! generated recommended questions.

pub mod expand;

#[cfg(test)]
mod tests;

pub use expand::{expand_query, merge_queries};

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::embedding::{Embedder, EmbeddingSession};
use crate::language::Language;
use crate::llm::ChatClient;
use crate::tenant::Tenant;
use crate::vectorstore::{
    VectorStore, VectorStoreError, cosine_similarity, questions_collection,
};

struct Candidate {
    question: String,
    language: String,
    retrieval_score: f32,
}

/// Recommends follow-up questions for an answered query.
pub struct FollowUpRecommender<V> {
    store: Arc<V>,
    chat: ChatClient,
    expansion_enabled: bool,
    retrieval_threshold: f32,
    cosine_threshold: f32,
}

impl<V: VectorStore> FollowUpRecommender<V> {
    /// Creates a recommender. `retrieval_threshold` gates retrieval scores,
    /// `cosine_threshold` gates the re-verification pass.
    pub fn new(
        store: Arc<V>,
        chat: ChatClient,
        expansion_enabled: bool,
        retrieval_threshold: f32,
        cosine_threshold: f32,
    ) -> Self {
        Self {
            store,
            chat,
            expansion_enabled,
            retrieval_threshold,
            cosine_threshold,
        }
    }

    /// Returns up to `limit` follow-up questions, rank order preserved.
    ///
    /// This path is advisory: every failure degrades to an empty list.
    #[instrument(skip(self, session, query), fields(collection = %tenant.collection, language = %language))]
    pub async fn recommend<E: Embedder>(
        &self,
        session: &EmbeddingSession<E>,
        tenant: &Tenant,
        query: &str,
        language: Language,
        limit: usize,
    ) -> Vec<String> {
        let collection = questions_collection(&tenant.collection);
        let queries = expand_query(&self.chat, query, self.expansion_enabled).await;

        // Retrieval over all expanded queries. Only the first (original)
        // query's embedding is retained; it anchors re-verification.
        let mut original_embedding: Option<Vec<f32>> = None;
        let mut candidates: Vec<Candidate> = Vec::new();

        for (i, expanded) in queries.iter().enumerate() {
            let vector = match session.embed_query(expanded).await {
                Ok(vector) => vector,
                Err(e) => {
                    if i == 0 {
                        warn!(error = %e, "failed to embed original query; skipping follow-up");
                        return Vec::new();
                    }
                    warn!(error = %e, "failed to embed expanded query");
                    continue;
                }
            };
            if i == 0 {
                original_embedding = Some(vector.clone());
            }

            let matches = match self.store.query(&collection, &vector, 2 * limit).await {
                Ok(matches) => matches,
                Err(VectorStoreError::CollectionNotFound { .. }) => {
                    debug!("tenant has no recommended-question collection");
                    return Vec::new();
                }
                Err(e) => {
                    warn!(error = %e, "follow-up retrieval failed");
                    continue;
                }
            };

            for record in matches {
                let question = record
                    .metadata
                    .get("question")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_else(|| record.text())
                    .trim()
                    .to_string();
                if question.is_empty() {
                    continue;
                }
                let question_language = record
                    .metadata
                    .get("language")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("zh")
                    .to_string();
                candidates.push(Candidate {
                    question,
                    language: question_language,
                    retrieval_score: record.score,
                });
            }
        }

        let Some(original_embedding) = original_embedding else {
            return Vec::new();
        };

        // Deduplicate by lowercased text, first (highest-rank) occurrence
        // wins.
        let mut seen = std::collections::HashSet::new();
        let unique: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| seen.insert(c.question.to_lowercase()))
            .collect();
        if unique.is_empty() {
            return Vec::new();
        }

        // Re-verification: one batch embedding over the unique candidates,
        // cosine against the original query.
        let texts: Vec<String> = unique.iter().map(|c| c.question.clone()).collect();
        let embeddings = match session.embed_batch(&texts).await {
            Ok(embeddings) => embeddings,
            Err(e) => {
                warn!(error = %e, "candidate re-verification failed");
                return Vec::new();
            }
        };

        let query_lower = query.trim().to_lowercase();
        let mut follow_up = Vec::with_capacity(limit);
        for (candidate, embedding) in unique.iter().zip(embeddings) {
            if candidate.retrieval_score < self.retrieval_threshold {
                continue;
            }
            let verified = cosine_similarity(&original_embedding, &embedding);
            if verified < self.cosine_threshold {
                debug!(question = %candidate.question, verified, "dropped off-topic candidate");
                continue;
            }
            if candidate.language != language.as_str() {
                continue;
            }
            if candidate.question.to_lowercase() == query_lower {
                continue;
            }
            if !Language::is_question(&candidate.question) {
                continue;
            }
            follow_up.push(candidate.question.clone());
            if follow_up.len() == limit {
                break;
            }
        }

        debug!(returned = follow_up.len(), "follow-up recommendation complete");
        follow_up
    }
}
