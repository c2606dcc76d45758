//! Passage retrieval with citation assembly.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::RetrieveError;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::constants::{CITATION_CONTENT_MAX_CHARS, MAX_CITATIONS, MIN_CHUNK_CHARS, ERROR_MARKERS};
use crate::embedding::{Embedder, EmbeddingSession};
use crate::vectorstore::{QueryMatch, VectorStore};

/// A bounded excerpt of a retrieved chunk, surfaced for provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Record id of the source chunk.
    pub id: String,
    /// Source URL or file path.
    pub source: String,
    /// Excerpt, truncated to 500 characters.
    pub content: String,
    /// Cosine similarity when the backend reported one.
    pub score: Option<f32>,
}

/// Result of a retrieval pass.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    /// Concatenated passage texts handed to the generator.
    pub context: String,
    /// Citations for the passages that built the context.
    pub citations: Vec<Citation>,
    /// Set when filtering removed every record and the unfiltered top-k was
    /// used instead.
    pub degraded: bool,
    /// Set when the final context is too short to answer from.
    pub empty: bool,
}

/// Truncates a string to at most `max` characters, respecting UTF-8
/// boundaries.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

/// Returns `true` for chunks stamped by a failed crawl or parse. These never
/// reach the generator.
pub fn is_error_chunk(record: &QueryMatch) -> bool {
    if record.metadata.get("error").is_some() {
        return true;
    }
    if let Some(inner) = record.metadata.get("metadata") {
        if inner.get("error").is_some() {
            return true;
        }
    }
    let text = record.text();
    ERROR_MARKERS.iter().any(|marker| text.contains(marker))
}

fn is_valid_chunk(record: &QueryMatch) -> bool {
    let text = record.text();
    !text.trim().is_empty() && text.chars().count() >= MIN_CHUNK_CHARS && !is_error_chunk(record)
}

/// Top-k passage retriever over a tenant's chunk collection.
pub struct Retriever<V> {
    store: Arc<V>,
    max_chunks: usize,
    retrieve_k: usize,
}

impl<V: VectorStore> Retriever<V> {
    /// Creates a retriever fetching `retrieve_k` records and keeping at most
    /// `max_chunks` after filtering.
    pub fn new(store: Arc<V>, max_chunks: usize, retrieve_k: usize) -> Self {
        Self {
            store,
            max_chunks,
            retrieve_k,
        }
    }

    /// Retrieves context and citations for `query` from `collection`.
    #[instrument(skip(self, session, query), fields(collection = collection))]
    pub async fn retrieve<E: Embedder>(
        &self,
        session: &EmbeddingSession<E>,
        collection: &str,
        query: &str,
    ) -> Result<Retrieval, RetrieveError> {
        let vector = session.embed_query(query).await?;
        let matches = self.store.query(collection, &vector, self.retrieve_k).await?;

        let (valid, dropped): (Vec<QueryMatch>, Vec<QueryMatch>) =
            matches.into_iter().partition(is_valid_chunk);

        if !dropped.is_empty() {
            debug!(dropped = dropped.len(), "filtered error or short chunks");
        }

        let (chosen, degraded) = if valid.is_empty() && !dropped.is_empty() {
            warn!("all retrieved chunks filtered out; falling back to unfiltered results");
            (dropped.into_iter().take(self.max_chunks).collect::<Vec<_>>(), true)
        } else {
            (valid, false)
        };

        let citations: Vec<Citation> = if degraded {
            Vec::new()
        } else {
            chosen
                .iter()
                .take(MAX_CITATIONS)
                .map(|record| Citation {
                    id: record.id.clone(),
                    source: record.source().to_string(),
                    content: truncate_chars(record.text(), CITATION_CONTENT_MAX_CHARS),
                    score: Some(record.score),
                })
                .collect()
        };

        let context = chosen
            .iter()
            .take(self.max_chunks)
            .map(|record| record.text())
            .collect::<Vec<_>>()
            .join("\n\n");

        let empty = context.trim().chars().count() < MIN_CHUNK_CHARS;

        Ok(Retrieval {
            context,
            citations,
            degraded,
            empty,
        })
    }
}
