//! On-disk fallback vector store.
//!
//! Collections live in memory and persist as one JSON file each under a base
//! directory. Queries are brute-force cosine scans, which is plenty for the
//! local-development corpus sizes this backend serves. It doubles as the test
//! backend.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::error::VectorStoreError;
use super::model::{QueryMatch, VectorRecord, cosine_similarity};
use super::validate_collection_name;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    vector: Vec<f32>,
    metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiskCollection {
    dimension: usize,
    records: BTreeMap<String, StoredRecord>,
}

/// JSON-file-backed vector store.
pub struct DiskVectorStore {
    base_dir: PathBuf,
    collections: RwLock<HashMap<String, DiskCollection>>,
}

impl DiskVectorStore {
    /// Opens a store rooted at `base_dir`, loading any existing collections.
    pub async fn open(base_dir: impl Into<PathBuf>) -> Result<Self, VectorStoreError> {
        let base_dir = base_dir.into();
        tokio::fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| VectorStoreError::ConnectionFailed {
                url: base_dir.display().to_string(),
                message: e.to_string(),
            })?;

        let mut collections = HashMap::new();
        let mut entries = tokio::fs::read_dir(&base_dir).await.map_err(|e| {
            VectorStoreError::ConnectionFailed {
                url: base_dir.display().to_string(),
                message: e.to_string(),
            }
        })?;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
                continue;
            };
            match tokio::fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<DiskCollection>(&bytes) {
                    Ok(collection) => {
                        collections.insert(name, collection);
                    }
                    Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable collection file"),
                },
                Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable collection file"),
            }
        }

        debug!(
            dir = %base_dir.display(),
            collections = collections.len(),
            "opened on-disk vector store"
        );

        Ok(Self {
            base_dir,
            collections: RwLock::new(collections),
        })
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{name}.json"))
    }

    async fn persist(&self, name: &str, collection: &DiskCollection) -> Result<(), VectorStoreError> {
        let bytes =
            serde_json::to_vec(collection).map_err(|e| VectorStoreError::PersistFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })?;
        tokio::fs::write(self.file_path(name), bytes)
            .await
            .map_err(|e| VectorStoreError::PersistFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })
    }
}

impl super::VectorStore for DiskVectorStore {
    async fn get_or_create(&self, name: &str, dimension: usize) -> Result<(), VectorStoreError> {
        validate_collection_name(name)?;

        let mut collections = self.collections.write().await;
        if !collections.contains_key(name) {
            let collection = DiskCollection {
                dimension,
                records: BTreeMap::new(),
            };
            self.persist(name, &collection).await?;
            collections.insert(name.to_string(), collection);
        }
        Ok(())
    }

    async fn upsert(&self, name: &str, records: Vec<VectorRecord>) -> Result<(), VectorStoreError> {
        validate_collection_name(name)?;
        if records.is_empty() {
            return Ok(());
        }

        let mut collections = self.collections.write().await;
        let collection =
            collections
                .get_mut(name)
                .ok_or_else(|| VectorStoreError::CollectionNotFound {
                    collection: name.to_string(),
                })?;

        for record in records {
            let record = record.sanitized();
            if record.vector.len() != collection.dimension {
                return Err(VectorStoreError::InvalidDimension {
                    expected: collection.dimension,
                    actual: record.vector.len(),
                });
            }
            collection.records.insert(
                record.id,
                StoredRecord {
                    vector: record.vector,
                    metadata: record.metadata,
                },
            );
        }

        let snapshot = collection.clone();
        self.persist(name, &snapshot).await
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        validate_collection_name(name)?;

        let collections = self.collections.read().await;
        let collection =
            collections
                .get(name)
                .ok_or_else(|| VectorStoreError::CollectionNotFound {
                    collection: name.to_string(),
                })?;

        let mut matches: Vec<QueryMatch> = collection
            .records
            .iter()
            .map(|(id, record)| QueryMatch {
                id: id.clone(),
                score: cosine_similarity(vector, &record.vector),
                metadata: record.metadata.clone(),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(k);
        Ok(matches)
    }

    async fn delete_by_id_prefix(&self, name: &str, prefix: &str) -> Result<u64, VectorStoreError> {
        validate_collection_name(name)?;

        let mut collections = self.collections.write().await;
        let Some(collection) = collections.get_mut(name) else {
            return Ok(0);
        };

        let doomed: Vec<String> = collection
            .records
            .range(prefix.to_string()..)
            .take_while(|(id, _)| id.starts_with(prefix))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &doomed {
            collection.records.remove(id);
        }

        let snapshot = collection.clone();
        self.persist(name, &snapshot).await?;
        Ok(doomed.len() as u64)
    }

    async fn delete_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        validate_collection_name(name)?;

        self.collections.write().await.remove(name);
        if let Err(e) = tokio::fs::remove_file(self.file_path(name)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(VectorStoreError::DeleteFailed {
                    collection: name.to_string(),
                    message: e.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn count(&self, name: &str) -> Result<usize, VectorStoreError> {
        validate_collection_name(name)?;
        Ok(self
            .collections
            .read()
            .await
            .get(name)
            .map(|c| c.records.len())
            .unwrap_or(0))
    }
}
