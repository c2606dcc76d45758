//! Postgres + pgvector backend.
//!
//! One table per collection under the `vecs` schema: text primary key,
//! `vector` embedding column, JSONB metadata. Cosine similarity is computed
//! as `1 - (embedding <=> query)`.

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, info, warn};

use super::error::VectorStoreError;
use super::model::{QueryMatch, VectorRecord};
use super::validate_collection_name;

/// Vector store backed by Postgres with the pgvector extension.
#[derive(Clone)]
pub struct PgVectorStore {
    pool: PgPool,
}

/// Formats a vector as a pgvector literal, e.g. `[0.1,0.2]`.
pub(crate) fn vector_literal(vector: &[f32]) -> String {
    let mut out = String::with_capacity(vector.len() * 10 + 2);
    out.push('[');
    for (i, v) in vector.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
    out
}

/// Escapes `LIKE` wildcards so a record-id prefix matches literally.
fn escape_like(prefix: &str) -> String {
    prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

impl PgVectorStore {
    /// Connects to `url` and prepares the `vecs` schema.
    pub async fn connect(url: &str) -> Result<Self, VectorStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(|e| VectorStoreError::ConnectionFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let store = Self { pool };
        store.prepare().await?;
        info!("connected to pgvector backend");
        Ok(store)
    }

    /// Wraps an existing pool (the answer-cache store shares it).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn prepare(&self) -> Result<(), VectorStoreError> {
        // The extension may already be installed by a migration run under a
        // more privileged role; failure here is not fatal.
        if let Err(e) = sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
        {
            warn!(error = %e, "could not ensure pgvector extension");
        }

        sqlx::query("CREATE SCHEMA IF NOT EXISTS vecs")
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::ConnectionFailed {
                url: "<pool>".to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    fn table(name: &str) -> String {
        format!("vecs.\"{name}\"")
    }

    async fn exists(&self, name: &str) -> Result<bool, VectorStoreError> {
        let regclass = format!("vecs.\"{name}\"");
        sqlx::query_scalar::<_, bool>("SELECT to_regclass($1::text) IS NOT NULL")
            .bind(regclass)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VectorStoreError::QueryFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })
    }

    async fn require_exists(&self, name: &str) -> Result<(), VectorStoreError> {
        if self.exists(name).await? {
            Ok(())
        } else {
            Err(VectorStoreError::CollectionNotFound {
                collection: name.to_string(),
            })
        }
    }
}

impl super::VectorStore for PgVectorStore {
    async fn get_or_create(&self, name: &str, dimension: usize) -> Result<(), VectorStoreError> {
        validate_collection_name(name)?;

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
             id TEXT PRIMARY KEY, \
             embedding vector({dimension}) NOT NULL, \
             metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb)",
            table = Self::table(name),
        );
        sqlx::query(&sql).execute(&self.pool).await.map_err(|e| {
            VectorStoreError::CreateFailed {
                collection: name.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(())
    }

    async fn upsert(&self, name: &str, records: Vec<VectorRecord>) -> Result<(), VectorStoreError> {
        validate_collection_name(name)?;
        if records.is_empty() {
            return Ok(());
        }
        self.require_exists(name).await?;

        let sql = format!(
            "INSERT INTO {table} (id, embedding, metadata) VALUES ($1, $2::vector, $3) \
             ON CONFLICT (id) DO UPDATE SET \
             embedding = EXCLUDED.embedding, metadata = EXCLUDED.metadata",
            table = Self::table(name),
        );

        let count = records.len();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VectorStoreError::UpsertFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })?;

        for record in records {
            let record = record.sanitized();
            sqlx::query(&sql)
                .bind(&record.id)
                .bind(vector_literal(&record.vector))
                .bind(&record.metadata)
                .execute(&mut *tx)
                .await
                .map_err(|e| VectorStoreError::UpsertFailed {
                    collection: name.to_string(),
                    message: e.to_string(),
                })?;
        }

        tx.commit()
            .await
            .map_err(|e| VectorStoreError::UpsertFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })?;

        debug!(collection = name, count, "upserted vector records");
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        validate_collection_name(name)?;
        self.require_exists(name).await?;

        let sql = format!(
            "SELECT id, metadata, 1 - (embedding <=> $1::vector) AS score \
             FROM {table} ORDER BY embedding <=> $1::vector LIMIT $2",
            table = Self::table(name),
        );

        let rows = sqlx::query(&sql)
            .bind(vector_literal(vector))
            .bind(k as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::QueryFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id").map_err(|e| VectorStoreError::QueryFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })?;
            let metadata: serde_json::Value =
                row.try_get("metadata")
                    .map_err(|e| VectorStoreError::QueryFailed {
                        collection: name.to_string(),
                        message: e.to_string(),
                    })?;
            let score: f64 = row
                .try_get("score")
                .map_err(|e| VectorStoreError::QueryFailed {
                    collection: name.to_string(),
                    message: e.to_string(),
                })?;
            matches.push(QueryMatch {
                id,
                score: score as f32,
                metadata,
            });
        }
        Ok(matches)
    }

    async fn delete_by_id_prefix(
        &self,
        name: &str,
        prefix: &str,
    ) -> Result<u64, VectorStoreError> {
        validate_collection_name(name)?;
        if !self.exists(name).await? {
            return Ok(0);
        }

        let sql = format!(
            "DELETE FROM {table} WHERE id LIKE $1 ESCAPE '\\'",
            table = Self::table(name),
        );
        let result = sqlx::query(&sql)
            .bind(format!("{}%", escape_like(prefix)))
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::DeleteFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })?;

        debug!(
            collection = name,
            prefix,
            deleted = result.rows_affected(),
            "deleted records by id prefix"
        );
        Ok(result.rows_affected())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        validate_collection_name(name)?;
        let sql = format!("DROP TABLE IF EXISTS {table}", table = Self::table(name));
        sqlx::query(&sql).execute(&self.pool).await.map_err(|e| {
            VectorStoreError::DeleteFailed {
                collection: name.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(())
    }

    async fn count(&self, name: &str) -> Result<usize, VectorStoreError> {
        validate_collection_name(name)?;
        if !self.exists(name).await? {
            return Ok(0);
        }

        let sql = format!("SELECT COUNT(*) FROM {table}", table = Self::table(name));
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VectorStoreError::QueryFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })?;
        Ok(count as usize)
    }
}
