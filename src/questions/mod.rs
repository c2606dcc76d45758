//! Frequent-questions builder.
//!
//! When a tenant has no curated recommended questions, onboarding
//! suggestions are generated on demand from a sample of the tenant's own
//! chunks and validated for answerability — unchecked model output routinely
//! hallucinates questions whose answers are nowhere in the corpus. Results
//! are cached in-process per `(tenant, language)`.


use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use moka::sync::Cache;
use tracing::{debug, info, instrument, warn};

use crate::constants::{
    FREQUENT_QUESTIONS_CACHE_CAPACITY, FREQUENT_QUESTIONS_TTL_SECS, MIN_CHUNK_CHARS,
};
use crate::embedding::{Embedder, EmbeddingSession};
use crate::language::Language;
use crate::llm::json::{parse_json, string_array};
use crate::llm::ChatClient;
use crate::retriever::is_error_chunk;
use crate::tenant::Tenant;
use crate::vectorstore::{QueryMatch, VectorStore};

const SAMPLE_PASSAGES: usize = 10;
const PROMPT_PASSAGES: usize = 5;
const QUESTIONS_WANTED: usize = 3;
const ANSWERABILITY_CANDIDATES: usize = 5;

fn usable_chunk(record: &QueryMatch) -> bool {
    let text = record.text();
    !text.trim().is_empty() && text.chars().count() >= MIN_CHUNK_CHARS && !is_error_chunk(record)
}

fn generation_prompt(passages: &[String], language: Language) -> String {
    let instruction = match language {
        Language::Zh => {
            "你是一个问题生成器。请根据下面给出的上下文生成3个不同且简洁的中文问题。\n\
             要求：\n\
             1. 生成用户可能会问的问题，问题要简洁、真实、口语化\n\
             2. 确保问题能从上下文中找到明确的答案\n\
             3. 问题必须以？结尾\n\
             4. 避免生成过于宽泛的问题（如\"介绍一下\"、\"说明一下\"）"
        }
        Language::En => {
            "You are a question generator. Based on the context below, produce 3 distinct, \
             concise questions in English.\n\
             Requirements:\n\
             1. Questions a real user would ask, short and conversational\n\
             2. Each question must have a clear answer in the context\n\
             3. Each question must end with ?\n\
             4. Avoid overly broad questions"
        }
        Language::Ja => {
            "あなたは質問生成器です。以下のコンテキストに基づいて、簡潔な日本語の質問を3つ生成してください。\n\
             要件：\n\
             1. ユーザーが実際に尋ねそうな、短く口語的な質問\n\
             2. 各質問の答えがコンテキストから明確に見つかること\n\
             3. 各質問は？で終わること\n\
             4. 範囲が広すぎる質問は避けること"
        }
    };

    format!(
        "{instruction}\n\n### 上下文 ###\n{context}\n\n### 返回格式 ###\n\
         {{\"questions\": [\"...\", \"...\", \"...\"]}}\n\
         只返回JSON，不要其他解释。",
        context = passages[..passages.len().min(PROMPT_PASSAGES)].join("\n\n---\n\n"),
    )
}

/// Parses model output into question candidates, tolerating JSON objects,
/// bare arrays, or one question per line with numbering, bullets, or quotes.
pub fn parse_generated_questions(text: &str) -> Vec<String> {
    if let Ok(value) = parse_json(text) {
        let from_key = string_array(&value, "questions");
        if !from_key.is_empty() {
            return from_key.into_iter().filter(|q| Language::is_question(q)).collect();
        }
        if let Some(items) = value.as_array() {
            return items
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|q| Language::is_question(q))
                .collect();
        }
    }

    text.lines()
        .map(clean_question_line)
        .filter(|q| !q.is_empty() && Language::is_question(q))
        .collect()
}

fn clean_question_line(line: &str) -> String {
    let mut cleaned = line.trim();

    // Strip list numbering like "1." / "2、" / "3)" and bullet markers.
    cleaned = cleaned
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start_matches(['.', '、', ')', ':', '：'])
        .trim_start_matches(['-', '*', '•'])
        .trim();

    cleaned.trim_matches(['"', '“', '”', '「', '」', '\'']).trim().to_string()
}

/// On-demand builder of onboarding questions, with an in-process cache.
pub struct FrequentQuestions<V> {
    store: Arc<V>,
    chat: ChatClient,
    cache: Cache<(String, Language), Arc<Vec<String>>>,
}

impl<V: VectorStore> FrequentQuestions<V> {
    /// Creates a builder. `chat` should target the cheap generation model.
    pub fn new(store: Arc<V>, chat: ChatClient) -> Self {
        Self {
            store,
            chat,
            cache: Cache::builder()
                .max_capacity(FREQUENT_QUESTIONS_CACHE_CAPACITY)
                .time_to_live(Duration::from_secs(FREQUENT_QUESTIONS_TTL_SECS))
                .build(),
        }
    }

    /// Drops cached triples for a tenant, all languages. Called after
    /// ingestion so new documents influence onboarding without waiting out
    /// the TTL.
    pub fn invalidate(&self, tenant_id: &str) {
        for language in [Language::Zh, Language::En, Language::Ja] {
            self.cache.invalidate(&(tenant_id.to_string(), language));
        }
    }

    /// Returns three onboarding questions and whether they came from the
    /// cache.
    #[instrument(skip(self, session), fields(tenant = %tenant.id, language = %language))]
    pub async fn get<E: Embedder>(
        &self,
        session: &EmbeddingSession<E>,
        tenant: &Tenant,
        language: Language,
    ) -> (Vec<String>, bool) {
        let key = (tenant.id.clone(), language);
        if let Some(cached) = self.cache.get(&key) {
            debug!("frequent questions served from cache");
            return (cached.as_ref().clone(), true);
        }

        let questions = self.build(session, tenant, language).await;
        self.cache.insert(key, Arc::new(questions.clone()));
        (questions, false)
    }

    async fn build<E: Embedder>(
        &self,
        session: &EmbeddingSession<E>,
        tenant: &Tenant,
        language: Language,
    ) -> Vec<String> {
        let passages = self.sample_passages(session, tenant, language).await;
        if passages.is_empty() {
            debug!("no usable chunks; returning default questions");
            return language
                .default_questions()
                .into_iter()
                .map(String::from)
                .collect();
        }

        let candidates = match self.chat.complete(&generation_prompt(&passages, language)).await {
            Ok(text) => parse_generated_questions(&text),
            Err(e) => {
                warn!(error = %e, "question generation failed");
                Vec::new()
            }
        };

        let survivors = self.answerable(session, tenant, candidates).await;

        let mut questions = survivors;
        if questions.len() < QUESTIONS_WANTED {
            for default in language.default_questions() {
                if questions.len() == QUESTIONS_WANTED {
                    break;
                }
                if !questions.iter().any(|q| q == default) {
                    questions.push(default.to_string());
                }
            }
        }
        questions.truncate(QUESTIONS_WANTED);

        info!(returned = questions.len(), "frequent questions built");
        questions
    }

    /// Samples representative chunks via the language's seed words.
    async fn sample_passages<E: Embedder>(
        &self,
        session: &EmbeddingSession<E>,
        tenant: &Tenant,
        language: Language,
    ) -> Vec<String> {
        let lookups = language.seed_words().map(|word| async move {
            let vector = session.embed_query(word).await.ok()?;
            self.store.query(&tenant.collection, &vector, 2).await.ok()
        });
        let results = join_all(lookups).await;

        let mut seen = std::collections::HashSet::new();
        let mut passages = Vec::new();
        for matches in results.into_iter().flatten() {
            for record in matches {
                if !usable_chunk(&record) {
                    continue;
                }
                let text = record.text().to_string();
                if seen.insert(text.clone()) {
                    passages.push(text);
                }
                if passages.len() == SAMPLE_PASSAGES {
                    return passages;
                }
            }
        }
        passages
    }

    /// Keeps candidates whose top-1 chunk lookup lands on a valid passage.
    async fn answerable<E: Embedder>(
        &self,
        session: &EmbeddingSession<E>,
        tenant: &Tenant,
        candidates: Vec<String>,
    ) -> Vec<String> {
        let candidates: Vec<String> = candidates
            .into_iter()
            .take(ANSWERABILITY_CANDIDATES)
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }

        let embeddings = match session.embed_batch(&candidates).await {
            Ok(embeddings) => embeddings,
            Err(e) => {
                warn!(error = %e, "answerability embedding failed");
                return Vec::new();
            }
        };

        let checks = embeddings.iter().map(|vector| async move {
            match self.store.query(&tenant.collection, vector, 1).await {
                Ok(matches) => matches.first().map(usable_chunk).unwrap_or(false),
                Err(_) => false,
            }
        });
        let verdicts = join_all(checks).await;

        candidates
            .into_iter()
            .zip(verdicts)
            .filter_map(|(question, ok)| ok.then_some(question))
            .collect()
    }
}
