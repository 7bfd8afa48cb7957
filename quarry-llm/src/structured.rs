//! Extraction of JSON payloads from free-form model output

use crate::types::{LlmError, LlmResult};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Locate the outermost JSON object or array in `response`.
///
/// Models often wrap JSON in prose or markdown fences; everything before the
/// first opening bracket and after its last matching closing bracket is ignored.
pub fn extract_json(response: &str) -> Option<&str> {
    let start = response.find(['{', '['])?;
    let close = match response.as_bytes()[start] {
        b'{' => '}',
        _ => ']',
    };
    let end = response.rfind(close)?;
    (end > start).then(|| &response[start..=end])
}

/// Parse a JSON value of type `T` out of a model response
pub fn parse_json_response<T: DeserializeOwned>(response: &str) -> LlmResult<T> {
    let json_str = extract_json(response).ok_or_else(|| {
        LlmError::InvalidOutput(format!(
            "No JSON found in model response: {}",
            preview(response)
        ))
    })?;

    serde_json::from_str(json_str).map_err(|e| {
        debug!("Failed to parse model response as JSON: {}", e);
        LlmError::InvalidOutput(format!("JSON parse error: {}", e))
    })
}

/// Like [`parse_json_response`], but a bare `null` answer yields `None`
pub fn parse_optional_json<T: DeserializeOwned>(response: &str) -> LlmResult<Option<T>> {
    let trimmed = strip_fences(response);
    if trimmed.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    parse_json_response(trimmed).map(Some)
}

fn strip_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}
