//! Tolerant extraction of JSON from model output.
//!
//! Models regularly wrap JSON in markdown fences or prepend prose; callers
//! that require JSON strip the wrapping before parsing.

use serde_json::Value;

use super::error::LlmError;

/// Strips a markdown code fence (```json ... ``` or ``` ... ```) if present.
pub fn extract_json_block(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```json") {
        let body = &trimmed[start + 7..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    } else if let Some(start) = trimmed.find("```") {
        let body = &trimmed[start + 3..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }

    trimmed
}

/// Parses model output as a JSON value, tolerating markdown fences.
pub fn parse_json(text: &str) -> Result<Value, LlmError> {
    let block = extract_json_block(text);
    serde_json::from_str(block).map_err(|e| LlmError::Parse {
        message: e.to_string(),
    })
}

/// Reads an array of strings at `key` from a JSON object, dropping
/// non-string entries.
pub fn string_array(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
