//! Shared numeric constants and bounds.

/// Embedding dimension of the default model (OpenAI `text-embedding-3-small`).
pub const DEFAULT_EMBEDDING_DIM: usize = 1536;

/// Minimum character count for a chunk (or a final context) to be considered
/// substantive. Shorter texts are treated as empty.
pub const MIN_CHUNK_CHARS: usize = 50;

/// Maximum number of citations attached to an answer.
pub const MAX_CITATIONS: usize = 5;

/// Maximum character count of a citation excerpt.
pub const CITATION_CONTENT_MAX_CHARS: usize = 500;

/// Default number of context chunks handed to the generator.
pub const DEFAULT_MAX_CHUNKS: usize = 4;

/// Default fetch size before error/short-chunk filtering.
pub const DEFAULT_RETRIEVE_K: usize = 8;

/// Default similarity threshold for an answer-cache hit.
pub const DEFAULT_CACHE_SIMILARITY_THRESHOLD: f32 = 0.95;

/// Default answer-cache entry lifetime in hours.
pub const DEFAULT_CACHE_TTL_HOURS: i64 = 24;

/// Default similarity threshold for a curated-QA match.
pub const DEFAULT_QA_MATCH_THRESHOLD: f32 = 0.85;

/// Default retrieval-score threshold for follow-up candidates.
pub const DEFAULT_QUESTION_SIMILARITY_THRESHOLD: f32 = 0.85;

/// Default cosine threshold for follow-up re-verification.
pub const DEFAULT_COSINE_SIMILARITY_THRESHOLD: f32 = 0.85;

/// Default number of follow-up questions returned per answer.
pub const DEFAULT_FOLLOW_UP_LIMIT: usize = 3;

/// Maximum number of queries after expansion (original included).
pub const MAX_EXPANDED_QUERIES: usize = 5;

/// Default number of recommended questions generated per language at
/// ingestion time.
pub const DEFAULT_QUESTIONS_PER_LANGUAGE: usize = 5;

/// Frequent-questions in-process cache lifetime.
pub const FREQUENT_QUESTIONS_TTL_SECS: u64 = 6 * 60 * 60;

/// Frequent-questions in-process cache capacity.
pub const FREQUENT_QUESTIONS_CACHE_CAPACITY: u64 = 1000;

/// Time budget for the answer-cache lookup tier.
pub const CACHE_CHECK_BUDGET_MS: u64 = 500;

/// Grace period for detached cache writes after the response completes.
pub const DETACHED_WRITE_GRACE_MS: u64 = 2000;

/// Token budget per chunk during ingestion.
pub const CHUNK_SIZE_TOKENS: usize = 256;

/// Token overlap between adjacent chunks.
pub const CHUNK_OVERLAP_TOKENS: usize = 48;

/// Markers stamped into chunk text by loaders when crawling or parsing fails.
/// Chunks carrying any of these never reach the generator.
pub const ERROR_MARKERS: [&str; 4] = ["爬取失败", "解析失败", "crawl failed", "parse failed"];
