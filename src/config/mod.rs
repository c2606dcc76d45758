//! Environment configuration.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_CACHE_SIMILARITY_THRESHOLD, DEFAULT_CACHE_TTL_HOURS,
    DEFAULT_COSINE_SIMILARITY_THRESHOLD, DEFAULT_EMBEDDING_DIM, DEFAULT_MAX_CHUNKS,
    DEFAULT_QA_MATCH_THRESHOLD, DEFAULT_QUESTIONS_PER_LANGUAGE,
    DEFAULT_QUESTION_SIMILARITY_THRESHOLD, DEFAULT_RETRIEVE_K,
};
use crate::orchestrator::ServiceSettings;

/// Service configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP port.
    pub port: u16,
    /// HTTP bind address.
    pub bind_addr: IpAddr,
    /// Root for the on-disk vector store and other local state.
    pub storage_path: PathBuf,
    /// Optional JSON file of tenants loaded at startup.
    pub tenants_path: Option<PathBuf>,

    /// Use the pgvector backend instead of the on-disk fallback.
    pub use_pgvector: bool,
    /// Postgres connection URL for the pgvector backend.
    pub pgvector_database_url: Option<String>,

    /// Final context size in chunks.
    pub max_chunks: usize,
    /// Fetch size before filtering.
    pub retrieve_k: usize,

    /// Whether the semantic answer cache participates.
    pub qa_cache_enabled: bool,
    /// Answer-cache hit threshold.
    pub qa_cache_similarity_threshold: f32,
    /// Answer-cache entry TTL in hours.
    pub qa_cache_ttl_hours: i64,

    /// Curated-QA match threshold.
    pub qa_match_threshold: f32,
    /// Follow-up retrieval-score threshold.
    pub question_similarity_threshold: f32,
    /// Follow-up re-verification threshold.
    pub cosine_similarity_threshold: f32,
    /// Whether query expansion runs before follow-up retrieval.
    pub query_expansion_enabled: bool,

    /// Recommended questions generated per language at ingestion.
    pub questions_per_language: usize,
    /// Model used for question generation and query expansion.
    pub question_generation_model: String,
    /// Provider hint; model names are resolved by the LLM client.
    pub llm_provider: Option<String>,
    /// Model used for grounded answer generation.
    pub chat_model: String,

    /// Embedding model name.
    pub embedding_model: String,
    /// Embedding dimension.
    pub embedding_dim: usize,

    /// Use the mock LLM provider (tests, offline development).
    pub mock_provider: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            storage_path: PathBuf::from("./.data"),
            tenants_path: None,
            use_pgvector: false,
            pgvector_database_url: None,
            max_chunks: DEFAULT_MAX_CHUNKS,
            retrieve_k: DEFAULT_RETRIEVE_K,
            qa_cache_enabled: true,
            qa_cache_similarity_threshold: DEFAULT_CACHE_SIMILARITY_THRESHOLD,
            qa_cache_ttl_hours: DEFAULT_CACHE_TTL_HOURS,
            qa_match_threshold: DEFAULT_QA_MATCH_THRESHOLD,
            question_similarity_threshold: DEFAULT_QUESTION_SIMILARITY_THRESHOLD,
            cosine_similarity_threshold: DEFAULT_COSINE_SIMILARITY_THRESHOLD,
            query_expansion_enabled: true,
            questions_per_language: DEFAULT_QUESTIONS_PER_LANGUAGE,
            question_generation_model: "gpt-4o-mini".to_string(),
            llm_provider: None,
            chat_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            mock_provider: false,
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "KBCHAT_PORT";
    const ENV_BIND_ADDR: &'static str = "KBCHAT_BIND_ADDR";
    const ENV_STORAGE_PATH: &'static str = "KBCHAT_STORAGE_PATH";
    const ENV_TENANTS_PATH: &'static str = "KBCHAT_TENANTS_PATH";
    const ENV_USE_PGVECTOR: &'static str = "USE_PGVECTOR";
    const ENV_DATABASE_URL: &'static str = "PGVECTOR_DATABASE_URL";
    const ENV_DATABASE_URL_FALLBACK: &'static str = "DATABASE_URL";
    const ENV_MAX_CHUNKS: &'static str = "MAX_CHUNKS";
    const ENV_RETRIEVE_K: &'static str = "RETRIEVE_K";
    const ENV_CACHE_ENABLED: &'static str = "QA_CACHE_ENABLED";
    const ENV_CACHE_THRESHOLD: &'static str = "QA_CACHE_SIMILARITY_THRESHOLD";
    const ENV_CACHE_TTL_HOURS: &'static str = "QA_CACHE_TTL_HOURS";
    const ENV_QA_MATCH_THRESHOLD: &'static str = "QA_MATCH_THRESHOLD";
    const ENV_QUESTION_SIMILARITY_THRESHOLD: &'static str = "QUESTION_SIMILARITY_THRESHOLD";
    const ENV_COSINE_SIMILARITY_THRESHOLD: &'static str = "COSINE_SIMILARITY_THRESHOLD";
    const ENV_QUERY_EXPANSION_ENABLED: &'static str = "QUERY_EXPANSION_ENABLED";
    const ENV_QUESTIONS_PER_LANGUAGE: &'static str = "QUESTIONS_PER_LANGUAGE";
    const ENV_QUESTION_GENERATION_MODEL: &'static str = "QUESTION_GENERATION_MODEL";
    const ENV_LLM_PROVIDER: &'static str = "LLM_PROVIDER";
    const ENV_CHAT_MODEL: &'static str = "KBCHAT_CHAT_MODEL";
    const ENV_EMBEDDING_MODEL: &'static str = "KBCHAT_EMBEDDING_MODEL";
    const ENV_EMBEDDING_DIM: &'static str = "KBCHAT_EMBEDDING_DIM";
    const ENV_MOCK_PROVIDER: &'static str = "KBCHAT_MOCK_PROVIDER";

    /// Reads configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            port: parse_port(env::var(Self::ENV_PORT).ok(), defaults.port)?,
            bind_addr: parse_bind_addr(env::var(Self::ENV_BIND_ADDR).ok(), defaults.bind_addr)?,
            storage_path: env::var(Self::ENV_STORAGE_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
            tenants_path: parse_optional(env::var(Self::ENV_TENANTS_PATH).ok()).map(PathBuf::from),
            use_pgvector: parse_bool(env::var(Self::ENV_USE_PGVECTOR).ok(), false),
            pgvector_database_url: parse_optional(env::var(Self::ENV_DATABASE_URL).ok())
                .or_else(|| parse_optional(env::var(Self::ENV_DATABASE_URL_FALLBACK).ok())),
            max_chunks: parse_usize(
                env::var(Self::ENV_MAX_CHUNKS).ok(),
                defaults.max_chunks,
                Self::ENV_MAX_CHUNKS,
            )?,
            retrieve_k: parse_usize(
                env::var(Self::ENV_RETRIEVE_K).ok(),
                defaults.retrieve_k,
                Self::ENV_RETRIEVE_K,
            )?,
            qa_cache_enabled: parse_bool(env::var(Self::ENV_CACHE_ENABLED).ok(), true),
            qa_cache_similarity_threshold: parse_f32(
                env::var(Self::ENV_CACHE_THRESHOLD).ok(),
                defaults.qa_cache_similarity_threshold,
                Self::ENV_CACHE_THRESHOLD,
            )?,
            qa_cache_ttl_hours: parse_i64(
                env::var(Self::ENV_CACHE_TTL_HOURS).ok(),
                defaults.qa_cache_ttl_hours,
                Self::ENV_CACHE_TTL_HOURS,
            )?,
            qa_match_threshold: parse_f32(
                env::var(Self::ENV_QA_MATCH_THRESHOLD).ok(),
                defaults.qa_match_threshold,
                Self::ENV_QA_MATCH_THRESHOLD,
            )?,
            question_similarity_threshold: parse_f32(
                env::var(Self::ENV_QUESTION_SIMILARITY_THRESHOLD).ok(),
                defaults.question_similarity_threshold,
                Self::ENV_QUESTION_SIMILARITY_THRESHOLD,
            )?,
            cosine_similarity_threshold: parse_f32(
                env::var(Self::ENV_COSINE_SIMILARITY_THRESHOLD).ok(),
                defaults.cosine_similarity_threshold,
                Self::ENV_COSINE_SIMILARITY_THRESHOLD,
            )?,
            query_expansion_enabled: parse_bool(
                env::var(Self::ENV_QUERY_EXPANSION_ENABLED).ok(),
                true,
            ),
            questions_per_language: parse_usize(
                env::var(Self::ENV_QUESTIONS_PER_LANGUAGE).ok(),
                DEFAULT_QUESTIONS_PER_LANGUAGE,
                Self::ENV_QUESTIONS_PER_LANGUAGE,
            )?,
            question_generation_model: env::var(Self::ENV_QUESTION_GENERATION_MODEL)
                .unwrap_or(defaults.question_generation_model),
            llm_provider: parse_optional(env::var(Self::ENV_LLM_PROVIDER).ok()),
            chat_model: env::var(Self::ENV_CHAT_MODEL).unwrap_or(defaults.chat_model),
            embedding_model: env::var(Self::ENV_EMBEDDING_MODEL)
                .unwrap_or(defaults.embedding_model),
            embedding_dim: parse_usize(
                env::var(Self::ENV_EMBEDDING_DIM).ok(),
                defaults.embedding_dim,
                Self::ENV_EMBEDDING_DIM,
            )?,
            mock_provider: env::var_os(Self::ENV_MOCK_PROVIDER).is_some_and(|v| !v.is_empty()),
        })
    }

    /// Validates cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.use_pgvector && self.pgvector_database_url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        if self.storage_path.exists() && !self.storage_path.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.storage_path.clone(),
            });
        }

        for (var, value) in [
            (Self::ENV_CACHE_THRESHOLD, self.qa_cache_similarity_threshold),
            (Self::ENV_QA_MATCH_THRESHOLD, self.qa_match_threshold),
            (
                Self::ENV_QUESTION_SIMILARITY_THRESHOLD,
                self.question_similarity_threshold,
            ),
            (
                Self::ENV_COSINE_SIMILARITY_THRESHOLD,
                self.cosine_similarity_threshold,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { var, value });
            }
        }

        Ok(())
    }

    /// The socket address string to bind.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Derives orchestrator settings from this configuration.
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            max_chunks: self.max_chunks,
            retrieve_k: self.retrieve_k,
            cache_enabled: self.qa_cache_enabled,
            cache_threshold: self.qa_cache_similarity_threshold,
            cache_ttl_hours: self.qa_cache_ttl_hours,
            qa_threshold: self.qa_match_threshold,
            question_similarity_threshold: self.question_similarity_threshold,
            cosine_similarity_threshold: self.cosine_similarity_threshold,
            expansion_enabled: self.query_expansion_enabled,
            follow_up_limit: crate::constants::DEFAULT_FOLLOW_UP_LIMIT,
            questions_per_language: self.questions_per_language,
        }
    }
}

fn parse_optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value {
        Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        None => default,
    }
}

fn parse_port(value: Option<String>, default: u16) -> Result<u16, ConfigError> {
    match value {
        Some(value) => {
            let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                value: value.clone(),
                source: e,
            })?;
            if port == 0 {
                return Err(ConfigError::InvalidPort { value });
            }
            Ok(port)
        }
        None => Ok(default),
    }
}

fn parse_bind_addr(value: Option<String>, default: IpAddr) -> Result<IpAddr, ConfigError> {
    match value {
        Some(value) => value
            .parse()
            .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
        None => Ok(default),
    }
}

fn parse_usize(
    value: Option<String>,
    default: usize,
    var: &'static str,
) -> Result<usize, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        None => Ok(default),
    }
}

fn parse_i64(value: Option<String>, default: i64, var: &'static str) -> Result<i64, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        None => Ok(default),
    }
}

fn parse_f32(value: Option<String>, default: f32, var: &'static str) -> Result<f32, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        None => Ok(default),
    }
}
