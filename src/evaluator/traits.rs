//! Core trait for text evaluation backends.

use async_trait::async_trait;

use crate::types::PollxError;

/// Error types for evaluation calls.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Response had no usable text
    #[error("Empty response")]
    EmptyResponse,

    /// Text was not the JSON we asked for
    #[error("Parse error: {0}")]
    Parse(String),

    /// The call did not finish in time
    #[error("Timed out")]
    TimedOut,
}

impl From<EvaluationError> for PollxError {
    fn from(err: EvaluationError) -> Self {
        PollxError::Evaluation(err.to_string())
    }
}

/// Core trait for text evaluation backends.
///
/// Implementations send `prompt` to a model asked to answer in JSON and
/// return the parsed value.
#[async_trait]
pub trait TextEvaluator: Send + Sync {
    /// Backend identifier (model name)
    fn id(&self) -> &str;

    async fn evaluate(&self, prompt: &str) -> Result<serde_json::Value, EvaluationError>;
}

/// Remove Markdown code fences a model may wrap JSON in
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Parse model text as JSON, tolerating code fences
pub fn parse_json_text(text: &str) -> Result<serde_json::Value, EvaluationError> {
    let cleaned = strip_code_fences(text);
    if cleaned.is_empty() {
        return Err(EvaluationError::EmptyResponse);
    }
    serde_json::from_str(cleaned).map_err(|e| EvaluationError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_json_text() {
        assert_eq!(
            parse_json_text("```json {\"x\": 2} ```").unwrap(),
            serde_json::json!({"x": 2})
        );
        assert!(matches!(parse_json_text("``````"), Err(EvaluationError::EmptyResponse)));
        assert!(matches!(parse_json_text("not json"), Err(EvaluationError::Parse(_))));
    }
}
