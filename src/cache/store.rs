//! Answer-cache storage backends.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sqlx::Row;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::error::CacheError;
use super::{AnswerEntry, CacheHit, CachedAnswer};
use crate::language::Language;
use crate::vectorstore::cosine_similarity;
use crate::vectorstore::pgvector::vector_literal;

/// Storage interface for cached answers: a vector index over question
/// embeddings plus the answer rows themselves.
pub trait AnswerStore: Send + Sync {
    /// Returns the closest unexpired entry for `tenant` + `language`, with
    /// its similarity score. Threshold filtering happens in the caller.
    fn top1(
        &self,
        tenant: &str,
        language: Language,
        vector: &[f32],
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<CacheHit>, CacheError>> + Send;

    /// Inserts an entry. Near-duplicates are allowed; they reconcile at
    /// lookup time through similarity matching.
    fn insert(
        &self,
        entry: AnswerEntry,
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;

    /// Increments the hit counter of an entry.
    fn bump_hits(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;

    /// Removes every entry for a tenant. Returns the number removed.
    fn clear_tenant(
        &self,
        tenant: &str,
    ) -> impl std::future::Future<Output = Result<u64, CacheError>> + Send;

    /// Removes entries for a tenant whose answer equals `answer` exactly.
    fn clear_by_answer(
        &self,
        tenant: &str,
        answer: &str,
    ) -> impl std::future::Future<Output = Result<u64, CacheError>> + Send;

    /// Removes expired entries across all tenants.
    fn purge_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, CacheError>> + Send;
}

/// In-memory store used by the on-disk deployment profile and by tests.
#[derive(Default)]
pub struct MemoryAnswerStore {
    entries: RwLock<Vec<AnswerEntry>>,
}

impl MemoryAnswerStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Hit count of an entry, for assertions.
    pub fn hit_count(&self, id: Uuid) -> Option<i64> {
        self.entries.read().iter().find(|e| e.id == id).map(|e| e.hit_count)
    }

    /// Sum of all hit counters, for assertions.
    pub fn total_hits(&self) -> i64 {
        self.entries.read().iter().map(|e| e.hit_count).sum()
    }
}

impl AnswerStore for MemoryAnswerStore {
    async fn top1(
        &self,
        tenant: &str,
        language: Language,
        vector: &[f32],
        now: DateTime<Utc>,
    ) -> Result<Option<CacheHit>, CacheError> {
        let entries = self.entries.read();
        let best = entries
            .iter()
            .filter(|e| e.tenant == tenant && e.language == language && e.expires_at > now)
            .map(|e| (e, cosine_similarity(vector, &e.embedding)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(best.map(|(entry, score)| CacheHit {
            id: entry.id,
            score,
            answer: CachedAnswer {
                answer: entry.answer.clone(),
                context: entry.context.clone(),
                citations: entry.citations.clone(),
                follow_up: entry.follow_up.clone(),
            },
        }))
    }

    async fn insert(&self, entry: AnswerEntry) -> Result<(), CacheError> {
        self.entries.write().push(entry);
        Ok(())
    }

    async fn bump_hits(&self, id: Uuid) -> Result<(), CacheError> {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
            entry.hit_count += 1;
        }
        Ok(())
    }

    async fn clear_tenant(&self, tenant: &str) -> Result<u64, CacheError> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.tenant != tenant);
        Ok((before - entries.len()) as u64)
    }

    async fn clear_by_answer(&self, tenant: &str, answer: &str) -> Result<u64, CacheError> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| !(e.tenant == tenant && e.answer == answer));
        Ok((before - entries.len()) as u64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, CacheError> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}

fn store_err(e: impl std::fmt::Display) -> CacheError {
    CacheError::Store {
        message: e.to_string(),
    }
}

/// Postgres-backed store: one `qa_cache` table with a pgvector column over
/// the question embedding.
#[derive(Clone)]
pub struct PgAnswerStore {
    pool: PgPool,
}

impl PgAnswerStore {
    /// Prepares the `qa_cache` table and returns a store over `pool`.
    pub async fn connect(pool: PgPool, dimension: usize) -> Result<Self, CacheError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS qa_cache (\
             id UUID PRIMARY KEY, \
             tenant TEXT NOT NULL, \
             question TEXT NOT NULL, \
             question_embedding vector({dimension}) NOT NULL, \
             answer TEXT NOT NULL, \
             context TEXT NOT NULL DEFAULT '', \
             citations JSONB NOT NULL DEFAULT '[]'::jsonb, \
             follow_up JSONB NOT NULL DEFAULT '[]'::jsonb, \
             language TEXT NOT NULL, \
             expires_at TIMESTAMPTZ NOT NULL, \
             created_at TIMESTAMPTZ NOT NULL, \
             hit_count BIGINT NOT NULL DEFAULT 0)"
        );
        sqlx::query(&ddl).execute(&pool).await.map_err(store_err)?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS qa_cache_scope_idx \
             ON qa_cache (tenant, language, expires_at)",
        )
        .execute(&pool)
        .await
        .map_err(store_err)?;

        Ok(Self { pool })
    }
}

impl AnswerStore for PgAnswerStore {
    async fn top1(
        &self,
        tenant: &str,
        language: Language,
        vector: &[f32],
        now: DateTime<Utc>,
    ) -> Result<Option<CacheHit>, CacheError> {
        let row = sqlx::query(
            "SELECT id, answer, context, citations, follow_up, \
             1 - (question_embedding <=> $1::vector) AS score \
             FROM qa_cache \
             WHERE tenant = $2 AND language = $3 AND expires_at > $4 \
             ORDER BY question_embedding <=> $1::vector LIMIT 1",
        )
        .bind(vector_literal(vector))
        .bind(tenant)
        .bind(language.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let citations: serde_json::Value = row.try_get("citations").map_err(store_err)?;
        let follow_up: serde_json::Value = row.try_get("follow_up").map_err(store_err)?;
        let score: f64 = row.try_get("score").map_err(store_err)?;

        Ok(Some(CacheHit {
            id: row.try_get("id").map_err(store_err)?,
            score: score as f32,
            answer: CachedAnswer {
                answer: row.try_get("answer").map_err(store_err)?,
                context: row.try_get("context").map_err(store_err)?,
                citations: serde_json::from_value(citations).map_err(store_err)?,
                follow_up: serde_json::from_value(follow_up).map_err(store_err)?,
            },
        }))
    }

    async fn insert(&self, entry: AnswerEntry) -> Result<(), CacheError> {
        sqlx::query(
            "INSERT INTO qa_cache \
             (id, tenant, question, question_embedding, answer, context, citations, \
              follow_up, language, expires_at, created_at, hit_count) \
             VALUES ($1, $2, $3, $4::vector, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(entry.id)
        .bind(&entry.tenant)
        .bind(&entry.question)
        .bind(vector_literal(&entry.embedding))
        .bind(&entry.answer)
        .bind(&entry.context)
        .bind(serde_json::to_value(&entry.citations).map_err(store_err)?)
        .bind(serde_json::to_value(&entry.follow_up).map_err(store_err)?)
        .bind(entry.language.as_str())
        .bind(entry.expires_at)
        .bind(entry.created_at)
        .bind(entry.hit_count)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn bump_hits(&self, id: Uuid) -> Result<(), CacheError> {
        sqlx::query("UPDATE qa_cache SET hit_count = hit_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn clear_tenant(&self, tenant: &str) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM qa_cache WHERE tenant = $1")
            .bind(tenant)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected())
    }

    async fn clear_by_answer(&self, tenant: &str, answer: &str) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM qa_cache WHERE tenant = $1 AND answer = $2")
            .bind(tenant)
            .bind(answer)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM qa_cache WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected())
    }
}
