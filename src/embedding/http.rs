//! OpenAI-compatible embedding client.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::embeddings::CreateEmbeddingRequestArgs;

use super::{Embedder, EmbeddingError};

/// Embedding client backed by the OpenAI embeddings API.
///
/// One instance is created at startup and shared process-wide; the underlying
/// HTTP client is safe for concurrent use.
pub struct HttpEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dimension: usize,
}

impl HttpEmbedder {
    /// Creates a client for `model` producing `dimension`-sized vectors.
    ///
    /// Credentials come from the standard `OPENAI_API_KEY` environment
    /// variable (and `OPENAI_API_BASE` for compatible endpoints).
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
            dimension,
        }
    }

    /// Creates a client with an explicit configuration.
    pub fn with_config(config: OpenAIConfig, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.into(),
            dimension,
        }
    }

    /// The configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let expected = texts.len();

        let mut builder = CreateEmbeddingRequestArgs::default();
        builder.model(&self.model).input(texts);
        // Only the v3 model family accepts a dimensions override.
        if self.model.starts_with("text-embedding-3") {
            builder.dimensions(self.dimension as u32);
        }
        let request = builder.build().map_err(|e| EmbeddingError::RequestFailed {
            message: e.to_string(),
        })?;

        let response = self.client.embeddings().create(request).await.map_err(|e| {
            EmbeddingError::RequestFailed {
                message: e.to_string(),
            }
        })?;

        if response.data.len() != expected {
            return Err(EmbeddingError::IncompleteResponse {
                expected,
                actual: response.data.len(),
            });
        }

        let mut vectors = Vec::with_capacity(expected);
        for item in response.data {
            if item.embedding.len() != self.dimension {
                return Err(EmbeddingError::InvalidDimension {
                    expected: self.dimension,
                    actual: item.embedding.len(),
                });
            }
            vectors.push(item.embedding);
        }
        Ok(vectors)
    }
}

impl Embedder for HttpEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed(vec![text.to_string()]).await?;
        vectors.pop().ok_or(EmbeddingError::IncompleteResponse {
            expected: 1,
            actual: 0,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embed(texts.to_vec()).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
