//! Document indexing and recommended-question seeding.
//!
//! Loaders (PDF, DOCX, web crawl, …) live with the admin layer; ingestion
//! starts from extracted [`Document`]s. Documents are chunked on token
//! budgets, embedded in batches, and upserted under `{collection}_{n}` ids.
//! After ingestion the admin layer triggers [`Ingestor::seed_questions`] to
//! pre-generate the per-language recommended questions that back follow-up
//! suggestions and onboarding.

pub mod chunking;
pub mod error;

#[cfg(test)]
mod tests;

pub use chunking::chunk_text;
pub use error::IngestError;

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::constants::{
    CHUNK_OVERLAP_TOKENS, CHUNK_SIZE_TOKENS, ERROR_MARKERS, MIN_CHUNK_CHARS,
};
use crate::embedding::{Embedder, EmbeddingGateway};
use crate::language::Language;
use crate::llm::json::parse_json;
use crate::llm::ChatClient;
use crate::retriever::is_error_chunk;
use crate::tenant::Tenant;
use crate::vectorstore::{VectorRecord, VectorStore, questions_collection};

const EMBED_BATCH_SIZE: usize = 64;
const SAMPLE_PASSAGES: usize = 10;
const PROMPT_PASSAGES: usize = 5;

/// An extracted source document, ready for chunking.
#[derive(Debug, Clone)]
pub struct Document {
    /// Full extracted text.
    pub text: String,
    /// Source metadata; `source` should name the file or URL.
    pub metadata: Value,
}

impl Document {
    /// Creates a document with a `source` metadata field.
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: json!({ "source": source.into() }),
        }
    }
}

/// Returns `true` for documents stamped by a failed crawl or parse; these
/// are never chunked or embedded.
pub fn is_error_document(doc: &Document) -> bool {
    if doc.metadata.get("error").is_some() {
        return true;
    }
    ERROR_MARKERS.iter().any(|marker| doc.text.contains(marker))
}

fn seed_prompt(passages: &[String], per_language: usize) -> String {
    format!(
        "### 角色能力 ###\n\
         你是一个问题生成器，请根据下面给出的上下文分别用中文、英文和日文生成{per_language}个不同且简洁的问题。\n\n\
         要求：\n\
         1. 生成用户可能会问的问题，问题要简洁、真实、口语化\n\
         2. 确保问题能从文档中找到明确的答案\n\
         3. 问题应该以问号结尾（中文用？，英文用?，日文用？）\n\
         4. 避免生成过于宽泛的问题（如\"介绍一下\"、\"说明一下\"）\n\n\
         ### 上下文 ###\n{context}\n\n\
         ### 返回格式 ###\n\
         请严格按照下面描述的JSON格式进行输出，不需要解释：\n\
         {{\n    \"questions\": {{\n        \"zh\": [\"中文问题1？\"],\n        \"en\": [\"English question 1?\"],\n        \"ja\": [\"日本語の質問1？\"]\n    }}\n}}",
        context = passages[..passages.len().min(PROMPT_PASSAGES)].join("\n\n---\n\n"),
    )
}

fn clean_generated(language: Language, question: &str) -> Option<String> {
    let question = question.trim();
    if question.is_empty() {
        return None;
    }
    if Language::is_question(question) {
        return Some(question.to_string());
    }
    // Model forgot the mark on an otherwise usable question.
    if question.chars().count() > 5 {
        let mark = if language == Language::En { "?" } else { "？" };
        return Some(format!("{question}{mark}"));
    }
    None
}

/// Ingestion pipeline: chunk, embed, and index documents; seed the
/// recommended-question collection.
pub struct Ingestor<V, E> {
    store: Arc<V>,
    gateway: EmbeddingGateway<E>,
    chat: ChatClient,
    questions_per_language: usize,
}

impl<V, E> Ingestor<V, E>
where
    V: VectorStore,
    E: Embedder,
{
    /// Creates an ingestor. `chat` should target the cheap generation model.
    pub fn new(
        store: Arc<V>,
        gateway: EmbeddingGateway<E>,
        chat: ChatClient,
        questions_per_language: usize,
    ) -> Self {
        Self {
            store,
            gateway,
            chat,
            questions_per_language,
        }
    }

    /// Chunks, embeds, and indexes documents into the tenant's primary
    /// collection. Returns the number of chunks stored.
    #[instrument(skip(self, docs), fields(collection = %tenant.collection, docs = docs.len()))]
    pub async fn index_documents(
        &self,
        tenant: &Tenant,
        docs: Vec<Document>,
    ) -> Result<usize, IngestError> {
        let (valid, errored): (Vec<Document>, Vec<Document>) =
            docs.into_iter().partition(|d| !is_error_document(d));
        if !errored.is_empty() {
            warn!(skipped = errored.len(), "skipping documents with load errors");
        }

        let mut chunks: Vec<(String, Value)> = Vec::new();
        for doc in &valid {
            for chunk in chunk_text(&doc.text, CHUNK_SIZE_TOKENS, CHUNK_OVERLAP_TOKENS) {
                if chunk.trim().chars().count() < MIN_CHUNK_CHARS {
                    continue;
                }
                let mut metadata = doc.metadata.clone();
                if let Value::Object(map) = &mut metadata {
                    map.insert("text".to_string(), Value::String(chunk.clone()));
                } else {
                    metadata = json!({ "text": chunk });
                }
                chunks.push((chunk, metadata));
            }
        }

        if chunks.is_empty() {
            info!("nothing to index after chunking");
            return Ok(0);
        }

        self.store
            .get_or_create(&tenant.collection, self.gateway.dimension())
            .await?;
        // Ids continue after the existing records so re-ingestion never
        // silently overwrites earlier chunks.
        let base = self.store.count(&tenant.collection).await?;

        let mut stored = 0;
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|(text, _)| text.clone()).collect();
            let vectors = self.gateway.embed_batch(&texts).await?;

            let records: Vec<VectorRecord> = batch
                .iter()
                .zip(vectors)
                .map(|((_, metadata), vector)| {
                    let n = base + stored;
                    stored += 1;
                    VectorRecord::new(
                        format!("{}_{n}", tenant.collection),
                        vector,
                        metadata.clone(),
                    )
                })
                .collect();

            self.store.upsert(&tenant.collection, records).await?;
        }

        info!(stored, "indexed document chunks");
        Ok(stored)
    }

    /// Generates recommended questions for every language from a sample of
    /// the tenant's chunks and stores them in `{collection}_questions`.
    /// Regeneration replaces the tenant's previous set.
    #[instrument(skip(self), fields(collection = %tenant.collection))]
    pub async fn seed_questions(&self, tenant: &Tenant) -> Result<usize, IngestError> {
        let passages = self.sample_passages(tenant).await?;
        if passages.is_empty() {
            warn!("no usable chunks; skipping question seeding");
            return Ok(0);
        }

        let response = self
            .chat
            .complete(&seed_prompt(&passages, self.questions_per_language))
            .await?;
        let parsed = parse_json(&response)?;
        let null = Value::Null;
        let by_language = parsed.get("questions").unwrap_or(&null);

        let mut questions: Vec<(String, Language)> = Vec::new();
        for language in [Language::Zh, Language::En, Language::Ja] {
            let items = by_language
                .get(language.as_str())
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .filter_map(|q| clean_generated(language, q))
                        .take(self.questions_per_language)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            questions.extend(items.into_iter().map(|q| (q, language)));
        }

        if questions.is_empty() {
            warn!("question generation produced nothing usable");
            return Ok(0);
        }

        let collection = questions_collection(&tenant.collection);
        self.store
            .get_or_create(&collection, self.gateway.dimension())
            .await?;
        let prefix = format!("{collection}_{}_", tenant.id);
        self.store.delete_by_id_prefix(&collection, &prefix).await?;

        let texts: Vec<String> = questions.iter().map(|(q, _)| q.clone()).collect();
        let vectors = self.gateway.embed_batch(&texts).await?;

        let records: Vec<VectorRecord> = questions
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(n, ((question, language), vector))| {
                VectorRecord::new(
                    format!("{prefix}{n}"),
                    vector,
                    json!({
                        "question": question,
                        "language": language.as_str(),
                        "kb_id": tenant.id,
                        "text": question,
                    }),
                )
            })
            .collect();

        let seeded = records.len();
        self.store.upsert(&collection, records).await?;
        info!(seeded, "seeded recommended questions");
        Ok(seeded)
    }

    /// Samples up to ten representative chunks across all languages' seed
    /// words.
    async fn sample_passages(&self, tenant: &Tenant) -> Result<Vec<String>, IngestError> {
        if self.store.count(&tenant.collection).await.unwrap_or(0) == 0 {
            return Ok(Vec::new());
        }

        let session = self.gateway.session();
        let mut seen = std::collections::HashSet::new();
        let mut passages = Vec::new();

        'outer: for language in [Language::Zh, Language::En, Language::Ja] {
            for word in language.seed_words() {
                let Ok(vector) = session.embed_query(word).await else {
                    continue;
                };
                let Ok(matches) = self.store.query(&tenant.collection, &vector, 2).await else {
                    continue;
                };
                for record in matches {
                    let text = record.text();
                    if text.trim().chars().count() < MIN_CHUNK_CHARS || is_error_chunk(&record) {
                        continue;
                    }
                    if seen.insert(text.to_string()) {
                        passages.push(text.to_string());
                    }
                    if passages.len() == SAMPLE_PASSAGES {
                        break 'outer;
                    }
                }
            }
        }
        Ok(passages)
    }
}
