//! The per-query cascade.
//!
//! For each question the orchestrator runs, in order: semantic answer cache,
//! curated-QA match, retrieval plus grounded generation, and post-generation
//! work (follow-up suggestions and a detached cache write). The cache and QA
//! tiers and the follow-up recommender are advisory — their failures log and
//! degrade; only retrieval and generation are essential. Within one request
//! every tier shares a single embedding session, so the user's query text is
//! embedded at most once.

pub mod error;


pub use error::ChatError;

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::cache::{AnswerCache, AnswerStore, CachedAnswer};
use crate::constants::{
    CACHE_CHECK_BUDGET_MS, DEFAULT_CACHE_SIMILARITY_THRESHOLD, DEFAULT_CACHE_TTL_HOURS,
    DEFAULT_COSINE_SIMILARITY_THRESHOLD, DEFAULT_FOLLOW_UP_LIMIT, DEFAULT_MAX_CHUNKS,
    DEFAULT_QA_MATCH_THRESHOLD, DEFAULT_QUESTIONS_PER_LANGUAGE,
    DEFAULT_QUESTION_SIMILARITY_THRESHOLD, DEFAULT_RETRIEVE_K,
};
use crate::embedding::{Embedder, EmbeddingGateway};
use crate::followup::FollowUpRecommender;
use crate::generator::{ChatTurn, Generator};
use crate::ingest::{Document, Ingestor};
use crate::language::Language;
use crate::llm::ChatClient;
use crate::qa::QaService;
use crate::questions::FrequentQuestions;
use crate::retriever::{Citation, Retriever};
use crate::tenant::{Tenant, TenantDirectory};
use crate::vectorstore::{VectorStore, qa_collection, questions_collection};

/// One answer request.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The user's question.
    pub query: String,
    /// Tenant share token or id.
    pub tenant_token: String,
    /// Prior turns, oldest first. The current question is *not* included.
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    /// Answer language.
    #[serde(default)]
    pub language: Language,
}

/// Terminal payload of an answer stream.
#[derive(Debug, Clone, Serialize, Default)]
pub struct FinalAnswer {
    /// The full answer text.
    pub answer: String,
    /// Retrieval context the answer was grounded in.
    pub context: String,
    /// Citations, at most five.
    pub citations: Vec<Citation>,
    /// Follow-up suggestions, at most three.
    pub follow_up: Vec<String>,
    /// Set when the answer came from the semantic cache.
    pub cached: bool,
    /// Set when the answer came from a curated QA.
    pub qa_matched: bool,
}

/// Events produced by the answer stream.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A text delta.
    Delta(String),
    /// The terminal event; always the last on a successful stream.
    Final(FinalAnswer),
    /// A fatal mid-stream failure; always the last event when present.
    Error {
        /// Localized user-facing message.
        message: String,
    },
}

/// Tunable thresholds and limits, typically derived from [`crate::Config`].
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Final context size in chunks.
    pub max_chunks: usize,
    /// Fetch size before filtering.
    pub retrieve_k: usize,
    /// Whether the answer cache participates.
    pub cache_enabled: bool,
    /// Answer-cache hit threshold.
    pub cache_threshold: f32,
    /// Answer-cache entry TTL in hours.
    pub cache_ttl_hours: i64,
    /// Curated-QA match threshold.
    pub qa_threshold: f32,
    /// Follow-up retrieval-score threshold.
    pub question_similarity_threshold: f32,
    /// Follow-up re-verification threshold.
    pub cosine_similarity_threshold: f32,
    /// Whether query expansion runs before follow-up retrieval.
    pub expansion_enabled: bool,
    /// Follow-up suggestions per answer.
    pub follow_up_limit: usize,
    /// Recommended questions generated per language at ingestion.
    pub questions_per_language: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            max_chunks: DEFAULT_MAX_CHUNKS,
            retrieve_k: DEFAULT_RETRIEVE_K,
            cache_enabled: true,
            cache_threshold: DEFAULT_CACHE_SIMILARITY_THRESHOLD,
            cache_ttl_hours: DEFAULT_CACHE_TTL_HOURS,
            qa_threshold: DEFAULT_QA_MATCH_THRESHOLD,
            question_similarity_threshold: DEFAULT_QUESTION_SIMILARITY_THRESHOLD,
            cosine_similarity_threshold: DEFAULT_COSINE_SIMILARITY_THRESHOLD,
            expansion_enabled: true,
            follow_up_limit: DEFAULT_FOLLOW_UP_LIMIT,
            questions_per_language: DEFAULT_QUESTIONS_PER_LANGUAGE,
        }
    }
}

/// Tenant-facing chat configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ChatConfig {
    /// Display name.
    pub project_name: String,
    /// Avatar image URL.
    pub avatar_url: String,
    /// Welcome message.
    pub welcome_message: String,
    /// Onboarding questions, at most three.
    pub recommended_questions: Vec<String>,
}

/// The query-time orchestrator and admin entry points.
pub struct ChatService<V, E, A> {
    tenants: Arc<TenantDirectory>,
    gateway: EmbeddingGateway<E>,
    cache: AnswerCache<A>,
    qa: QaService<V, E, A>,
    retriever: Retriever<V>,
    generator: Generator,
    followup: FollowUpRecommender<V>,
    questions: FrequentQuestions<V>,
    ingestor: Ingestor<V, E>,
    store: Arc<V>,
    settings: ServiceSettings,
}

impl<V, E, A> ChatService<V, E, A>
where
    V: VectorStore + 'static,
    E: Embedder + 'static,
    A: AnswerStore + 'static,
{
    /// Wires the full cascade from its shared primitives. `chat` serves
    /// generation; `helper_chat` serves expansion and question generation
    /// and usually targets a cheaper model.
    pub fn new(
        tenants: Arc<TenantDirectory>,
        store: Arc<V>,
        embedder: Arc<E>,
        answer_store: Arc<A>,
        chat: ChatClient,
        helper_chat: ChatClient,
        settings: ServiceSettings,
    ) -> Self {
        let gateway = EmbeddingGateway::new(embedder);
        let cache = AnswerCache::new(
            answer_store,
            settings.cache_enabled,
            settings.cache_threshold,
            settings.cache_ttl_hours,
        );

        Self {
            tenants: Arc::clone(&tenants),
            gateway: gateway.clone(),
            cache: cache.clone(),
            qa: QaService::new(
                Arc::clone(&store),
                gateway.clone(),
                cache.clone(),
                settings.qa_threshold,
            ),
            retriever: Retriever::new(Arc::clone(&store), settings.max_chunks, settings.retrieve_k),
            generator: Generator::new(chat),
            followup: FollowUpRecommender::new(
                Arc::clone(&store),
                helper_chat.clone(),
                settings.expansion_enabled,
                settings.question_similarity_threshold,
                settings.cosine_similarity_threshold,
            ),
            questions: FrequentQuestions::new(Arc::clone(&store), helper_chat.clone()),
            ingestor: Ingestor::new(
                Arc::clone(&store),
                gateway,
                helper_chat,
                settings.questions_per_language,
            ),
            store,
            settings,
        }
    }

    /// The tenant directory.
    pub fn tenants(&self) -> &Arc<TenantDirectory> {
        &self.tenants
    }

    /// The curated-QA service, for admin hooks.
    pub fn qa(&self) -> &QaService<V, E, A> {
        &self.qa
    }

    /// The answer cache, for admin hooks.
    pub fn cache(&self) -> &AnswerCache<A> {
        &self.cache
    }

    fn resolve(&self, token: &str) -> Result<Tenant, ChatError> {
        self.tenants.resolve(token).ok_or(ChatError::UnknownTenant)
    }

    /// Runs the cascade for one question, streaming events to the caller.
    ///
    /// Tenant resolution failures surface as errors before any stream
    /// exists; everything after the stream begins degrades or ends with a
    /// terminal [`ChatEvent::Error`]. Dropping the stream cancels in-flight
    /// work; detached cache writes survive within their grace period.
    #[instrument(skip(self, request), fields(tenant_token = %request.tenant_token, language = %request.language))]
    pub fn answer_stream(
        self: Arc<Self>,
        request: ChatRequest,
    ) -> Result<impl Stream<Item = ChatEvent> + Send + 'static, ChatError> {
        if request.query.trim().is_empty() {
            return Err(ChatError::EmptyQuery);
        }
        let tenant = self.resolve(&request.tenant_token)?;

        let service = self;
        Ok(stream! {
            let session = service.gateway.session();
            let language = request.language;
            let limit = service.settings.follow_up_limit;

            // Answer-cache tier. Advisory, bounded to its latency budget.
            let lookup = tokio::time::timeout(
                Duration::from_millis(CACHE_CHECK_BUDGET_MS),
                service
                    .cache
                    .check(&session, &tenant.id, &request.query, language),
            )
            .await;
            match lookup {
                Ok(Ok(Some(hit))) => {
                    yield ChatEvent::Delta(hit.answer.clone());
                    yield ChatEvent::Final(FinalAnswer {
                        answer: hit.answer,
                        context: hit.context,
                        citations: hit.citations,
                        follow_up: hit.follow_up,
                        cached: true,
                        qa_matched: false,
                    });
                    session.log_stats();
                    return;
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => warn!(error = %e, "answer cache check failed; continuing"),
                Err(_) => warn!("answer cache check exceeded its budget; continuing"),
            }

            // Curated-QA tier. A hit is authoritative; a failure is not.
            match service.qa.match_qa(&session, &tenant, &request.query).await {
                Ok(Some(matched)) => {
                    yield ChatEvent::Delta(matched.answer.clone());

                    let follow_up = service
                        .followup
                        .recommend(&session, &tenant, &request.query, language, limit)
                        .await;

                    match session.embed_query(&request.query).await {
                        Ok(embedding) => service.cache.save_detached(
                            &tenant.id,
                            &request.query,
                            embedding,
                            CachedAnswer {
                                answer: matched.answer.clone(),
                                context: String::new(),
                                citations: Vec::new(),
                                follow_up: follow_up.clone(),
                            },
                            language,
                        ),
                        Err(e) => warn!(error = %e, "skipping cache write for curated answer"),
                    }

                    yield ChatEvent::Final(FinalAnswer {
                        answer: matched.answer,
                        context: String::new(),
                        citations: Vec::new(),
                        follow_up,
                        cached: false,
                        qa_matched: true,
                    });
                    session.log_stats();
                    return;
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "curated QA tier failed; continuing to retrieval"),
            }

            // Retrieval. Essential: a hard failure degrades to the localized
            // "no information" reply instead of an opaque error.
            let retrieval = match service
                .retriever
                .retrieve(&session, &tenant.collection, &request.query)
                .await
            {
                Ok(retrieval) => retrieval,
                Err(e) => {
                    error!(error = %e, "retrieval failed");
                    let reply = language.no_information_reply().to_string();
                    yield ChatEvent::Delta(reply.clone());
                    yield ChatEvent::Final(FinalAnswer {
                        answer: reply,
                        ..FinalAnswer::default()
                    });
                    return;
                }
            };

            if retrieval.empty {
                let reply = language.no_information_reply().to_string();
                yield ChatEvent::Delta(reply.clone());
                yield ChatEvent::Final(FinalAnswer {
                    answer: reply,
                    ..FinalAnswer::default()
                });
                session.log_stats();
                return;
            }

            // Generation, streaming deltas as they arrive.
            let mut turns = request.history.clone();
            turns.push(ChatTurn::user(request.query.clone()));

            let mut deltas = match service
                .generator
                .stream_answer(&turns, &retrieval.context, language)
                .await
            {
                Ok(deltas) => deltas,
                Err(e) => {
                    error!(error = %e, "generation failed to start");
                    yield ChatEvent::Error {
                        message: language.request_failed_reply().to_string(),
                    };
                    return;
                }
            };

            let mut answer = String::new();
            while let Some(delta) = deltas.next().await {
                match delta {
                    Ok(text) => {
                        answer.push_str(&text);
                        yield ChatEvent::Delta(text);
                    }
                    Err(e) => {
                        error!(error = %e, "generation failed mid-stream");
                        yield ChatEvent::Error {
                            message: language.request_failed_reply().to_string(),
                        };
                        return;
                    }
                }
            }

            // Post-generation: the terminal event waits on follow-up; the
            // cache write is detached and never delays it.
            let follow_up = service
                .followup
                .recommend(&session, &tenant, &request.query, language, limit)
                .await;

            match session.embed_query(&request.query).await {
                Ok(embedding) => service.cache.save_detached(
                    &tenant.id,
                    &request.query,
                    embedding,
                    CachedAnswer {
                        answer: answer.clone(),
                        context: retrieval.context.clone(),
                        citations: retrieval.citations.clone(),
                        follow_up: follow_up.clone(),
                    },
                    language,
                ),
                Err(e) => warn!(error = %e, "skipping answer cache write"),
            }

            session.log_stats();
            yield ChatEvent::Final(FinalAnswer {
                answer,
                context: retrieval.context,
                citations: retrieval.citations,
                follow_up,
                cached: false,
                qa_matched: false,
            });
        })
    }

    /// Non-streaming variant: folds the event stream into its terminal
    /// payload.
    pub async fn answer(self: Arc<Self>, request: ChatRequest) -> Result<FinalAnswer, ChatError> {
        let language = request.language;
        let stream = self.answer_stream(request)?;
        futures_util::pin_mut!(stream);

        let mut terminal = None;
        while let Some(event) = stream.next().await {
            match event {
                ChatEvent::Delta(_) => {}
                ChatEvent::Final(answer) => terminal = Some(answer),
                ChatEvent::Error { message } => {
                    return Err(ChatError::Generation { message });
                }
            }
        }

        terminal.ok_or_else(|| ChatError::Generation {
            message: language.request_failed_reply().to_string(),
        })
    }

    /// Onboarding questions for a tenant, with a cached flag.
    pub async fn frequent_questions(
        &self,
        tenant_token: &str,
        language: Language,
    ) -> Result<(Vec<String>, bool), ChatError> {
        let tenant = self.resolve(tenant_token)?;
        let session = self.gateway.session();
        Ok(self.questions.get(&session, &tenant, language).await)
    }

    /// Chat-widget configuration for a tenant.
    pub async fn chat_config(
        &self,
        tenant_token: &str,
        language: Language,
    ) -> Result<ChatConfig, ChatError> {
        let tenant = self.resolve(tenant_token)?;
        let session = self.gateway.session();
        let (recommended_questions, _) = self.questions.get(&session, &tenant, language).await;

        Ok(ChatConfig {
            project_name: tenant.project_name,
            avatar_url: tenant.avatar_url,
            welcome_message: tenant.welcome_message,
            recommended_questions,
        })
    }

    /// Admin hook: indexes documents into a tenant's collection. The
    /// tenant's answer cache and frequent-questions cache are invalidated —
    /// stale answers must not outlive the corpus they were grounded in.
    pub async fn ingest_documents(
        &self,
        tenant_token: &str,
        docs: Vec<Document>,
    ) -> Result<usize, ChatError> {
        let tenant = self.resolve(tenant_token)?;
        let stored = self.ingestor.index_documents(&tenant, docs).await?;

        if stored > 0 {
            if let Err(e) = self.cache.clear(&tenant.id).await {
                warn!(error = %e, "failed to clear answer cache after ingestion");
            }
            self.questions.invalidate(&tenant.id);
        }
        Ok(stored)
    }

    /// Admin hook: regenerates a tenant's recommended questions.
    pub async fn seed_questions(&self, tenant_token: &str) -> Result<usize, ChatError> {
        let tenant = self.resolve(tenant_token)?;
        Ok(self.ingestor.seed_questions(&tenant).await?)
    }

    /// Admin hook: removes a tenant's collections, cache entries, and
    /// directory registration.
    pub async fn purge_tenant(&self, tenant_token: &str) -> Result<(), ChatError> {
        let tenant = self.resolve(tenant_token)?;

        self.store.delete_collection(&tenant.collection).await?;
        self.store
            .delete_collection(&qa_collection(&tenant.collection))
            .await?;
        self.store
            .delete_collection(&questions_collection(&tenant.collection))
            .await?;

        if let Err(e) = self.cache.clear(&tenant.id).await {
            warn!(error = %e, "failed to clear answer cache during tenant purge");
        }
        self.questions.invalidate(&tenant.id);
        self.tenants.remove(&tenant.id);

        info!(tenant = %tenant.id, "tenant data purged");
        Ok(())
    }
}
