//! Curated QA: exact-intent matching and lifecycle.
//!
//! A curated QA binds a canonical question and its paraphrases to one fixed
//! answer. Every phrasing is embedded into `{collection}_qa` under ids
//! `{collection}_qa_{qa_id}_{i}` (`i = 0` is canonical), all sharing the
//! same answer in metadata — whichever phrasing matches, the answer is
//! correct. A match is treated as authoritative by the orchestrator, which
//! then skips retrieval and generation entirely.

pub mod error;


pub use error::QaError;

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::cache::{AnswerCache, AnswerStore};
use crate::embedding::{Embedder, EmbeddingGateway, EmbeddingSession};
use crate::tenant::Tenant;
use crate::vectorstore::{
    QueryMatch, VectorRecord, VectorStore, VectorStoreError, qa_collection,
};

/// A curated-QA match.
#[derive(Debug, Clone, PartialEq)]
pub struct QaMatch {
    /// Id of the matched QA item.
    pub qa_id: String,
    /// The phrasing that matched.
    pub question: String,
    /// The curated answer.
    pub answer: String,
    /// Cosine similarity of the match.
    pub score: f32,
}

/// One row of a curated-QA bulk import, before insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct QaRow {
    /// Canonical question (first `|`-separated phrasing).
    pub question: String,
    /// Remaining phrasings.
    pub paraphrases: Vec<String>,
    /// The shared answer.
    pub answer: String,
}

/// Summary of a bulk import.
#[derive(Debug, Default)]
pub struct ImportSummary {
    /// Rows imported.
    pub imported: usize,
    /// Rows rejected, with reasons.
    pub errors: Vec<String>,
}

/// Parses bulk-upload rows: column A holds `|`-separated phrasings (first is
/// canonical), column B the answer. Returns parsed rows plus per-row errors.
pub fn parse_qa_rows(rows: &[(String, String)]) -> (Vec<QaRow>, Vec<String>) {
    let mut parsed = Vec::new();
    let mut errors = Vec::new();

    for (idx, (questions, answer)) in rows.iter().enumerate() {
        let row_no = idx + 1;
        let answer = answer.trim();
        let phrasings: Vec<String> = questions
            .split('|')
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();

        if phrasings.is_empty() || answer.is_empty() {
            errors.push(format!("row {row_no}: question or answer is empty"));
            continue;
        }

        parsed.push(QaRow {
            question: phrasings[0].clone(),
            paraphrases: phrasings[1..].to_vec(),
            answer: answer.to_string(),
        });
    }

    (parsed, errors)
}

/// Curated-QA service: matching plus vector/cache lifecycle.
pub struct QaService<V, E, A> {
    store: Arc<V>,
    gateway: EmbeddingGateway<E>,
    cache: AnswerCache<A>,
    threshold: f32,
}

impl<V, E, A> QaService<V, E, A>
where
    V: VectorStore,
    E: Embedder,
    A: AnswerStore + 'static,
{
    /// Creates the service. `threshold` is the minimum similarity for a
    /// match to be treated as authoritative.
    pub fn new(
        store: Arc<V>,
        gateway: EmbeddingGateway<E>,
        cache: AnswerCache<A>,
        threshold: f32,
    ) -> Self {
        Self {
            store,
            gateway,
            cache,
            threshold,
        }
    }

    /// Matches a user question against the tenant's curated QA collection.
    ///
    /// Returns `None` on a below-threshold score or when the tenant has no
    /// curated QA collection yet.
    #[instrument(skip(self, session, question), fields(collection = %tenant.collection))]
    pub async fn match_qa(
        &self,
        session: &EmbeddingSession<E>,
        tenant: &Tenant,
        question: &str,
    ) -> Result<Option<QaMatch>, QaError> {
        let collection = qa_collection(&tenant.collection);
        let vector = session.embed_query(question).await?;

        let matches = match self.store.query(&collection, &vector, 1).await {
            Ok(matches) => matches,
            Err(VectorStoreError::CollectionNotFound { .. }) => {
                debug!("tenant has no curated QA collection");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let Some(best) = matches.into_iter().next() else {
            return Ok(None);
        };

        if best.score < self.threshold {
            debug!(score = best.score, threshold = self.threshold, "QA match below threshold");
            return Ok(None);
        }

        info!(score = best.score, "curated QA match");
        Ok(Some(Self::to_match(best)))
    }

    fn to_match(record: QueryMatch) -> QaMatch {
        let get = |key: &str| {
            record
                .metadata
                .get(key)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        QaMatch {
            qa_id: get("qa_id"),
            question: get("question"),
            answer: get("answer"),
            score: record.score,
        }
    }

    /// Creates or replaces the vectors of one curated QA. All phrasings are
    /// embedded in a single batch; stale vectors under the same `qa_id` are
    /// removed first so re-upserting yields the same id set.
    pub async fn upsert_qa(
        &self,
        tenant: &Tenant,
        qa_id: &str,
        question: &str,
        paraphrases: &[String],
        answer: &str,
    ) -> Result<usize, QaError> {
        let collection = qa_collection(&tenant.collection);

        let mut phrasings: Vec<String> = Vec::with_capacity(paraphrases.len() + 1);
        let question = question.trim();
        if !question.is_empty() {
            phrasings.push(question.to_string());
        }
        phrasings.extend(
            paraphrases
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        );
        if phrasings.is_empty() {
            return Err(QaError::EmptyQuestion {
                qa_id: qa_id.to_string(),
            });
        }

        self.store
            .get_or_create(&collection, self.gateway.dimension())
            .await?;

        let vectors = self.gateway.embed_batch(&phrasings).await?;

        let prefix = format!("{collection}_{qa_id}_");
        self.store.delete_by_id_prefix(&collection, &prefix).await?;

        let answer = answer.trim();
        let records: Vec<VectorRecord> = phrasings
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (phrasing, vector))| {
                VectorRecord::new(
                    format!("{prefix}{i}"),
                    vector,
                    json!({
                        "qa_id": qa_id,
                        "question": phrasing,
                        "answer": answer,
                        "is_main": i == 0,
                        "text": phrasing,
                    }),
                )
            })
            .collect();

        let stored = records.len();
        self.store.upsert(&collection, records).await?;
        info!(qa_id, stored, "stored curated QA vectors");
        Ok(stored)
    }

    /// Updates a curated QA: vectors for the `qa_id` are re-upserted and any
    /// cache entries carrying the pre-edit answer are purged, so a stale
    /// answer can never be served from the cache after the edit commits.
    pub async fn update_qa(
        &self,
        tenant: &Tenant,
        qa_id: &str,
        question: &str,
        paraphrases: &[String],
        answer: &str,
        previous_answer: &str,
    ) -> Result<usize, QaError> {
        let stored = self
            .upsert_qa(tenant, qa_id, question, paraphrases, answer)
            .await?;
        self.cache.clear_by_answer(&tenant.id, previous_answer).await?;
        Ok(stored)
    }

    /// Deletes a curated QA: vectors for every phrasing go first, then the
    /// cache entries bound to its answer.
    pub async fn delete_qa(
        &self,
        tenant: &Tenant,
        qa_id: &str,
        answer: &str,
    ) -> Result<(), QaError> {
        let collection = qa_collection(&tenant.collection);
        let prefix = format!("{collection}_{qa_id}_");
        let deleted = self.store.delete_by_id_prefix(&collection, &prefix).await?;
        self.cache.clear_by_answer(&tenant.id, answer).await?;
        info!(qa_id, deleted, "deleted curated QA");
        Ok(())
    }

    /// Imports parsed bulk rows, generating a fresh `qa_id` per row.
    pub async fn import_rows(
        &self,
        tenant: &Tenant,
        rows: &[(String, String)],
    ) -> Result<ImportSummary, QaError> {
        let (parsed, errors) = parse_qa_rows(rows);
        let mut summary = ImportSummary {
            imported: 0,
            errors,
        };

        for row in parsed {
            let qa_id = Uuid::new_v4().to_string();
            match self
                .upsert_qa(tenant, &qa_id, &row.question, &row.paraphrases, &row.answer)
                .await
            {
                Ok(_) => summary.imported += 1,
                Err(e) => summary.errors.push(format!("{}: {e}", row.question)),
            }
        }
        Ok(summary)
    }
}
