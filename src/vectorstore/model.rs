use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A record stored in a vector collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Collection-unique id, e.g. `{collection}_{n}` or
    /// `{collection}_qa_{qa_id}_{i}`.
    pub id: String,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Arbitrary JSON metadata; always carries a `text` field.
    pub metadata: Value,
}

impl VectorRecord {
    /// Creates a record.
    pub fn new(id: impl Into<String>, vector: Vec<f32>, metadata: Value) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata,
        }
    }

    /// Strips `U+0000` from every string in the id and metadata. Some
    /// backends reject null bytes inside JSON payloads.
    pub fn sanitized(mut self) -> Self {
        if self.id.contains('\u{0000}') {
            self.id = self.id.replace('\u{0000}', "");
        }
        strip_nulls(&mut self.metadata);
        self
    }
}

/// Recursively removes `U+0000` from every string in a JSON value.
pub fn strip_nulls(value: &mut Value) {
    match value {
        Value::String(s) => {
            if s.contains('\u{0000}') {
                *s = s.replace('\u{0000}', "");
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        Value::Object(map) => map.values_mut().for_each(strip_nulls),
        _ => {}
    }
}

/// A single query result.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    /// Record id.
    pub id: String,
    /// Cosine similarity to the query vector, in `[-1, 1]`.
    pub score: f32,
    /// Stored metadata.
    pub metadata: Value,
}

impl QueryMatch {
    /// The `text` metadata field, if present.
    pub fn text(&self) -> &str {
        self.metadata.get("text").and_then(Value::as_str).unwrap_or("")
    }

    /// The `source` (or `url`) metadata field, if present.
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .or_else(|| self.metadata.get("url"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}

/// Cosine similarity between two vectors. Returns `0.0` for mismatched or
/// empty inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
