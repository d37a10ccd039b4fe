//! Mock evaluation backend for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::traits::{EvaluationError, TextEvaluator};

/// Mock backend for testing.
///
/// Returns a fixed payload, or fails, optionally after a delay.
pub struct MockEvaluator {
    response: Result<serde_json::Value, String>,
    delay: Option<Duration>,
    call_count: AtomicU32,
}

impl MockEvaluator {
    /// Backend answering every prompt with `value`
    pub fn returning(value: serde_json::Value) -> Self {
        Self {
            response: Ok(value),
            delay: None,
            call_count: AtomicU32::new(0),
        }
    }

    /// Backend failing every call
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
            delay: None,
            call_count: AtomicU32::new(0),
        }
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of times evaluate was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextEvaluator for MockEvaluator {
    fn id(&self) -> &str {
        "mock-evaluator"
    }

    async fn evaluate(&self, _prompt: &str) -> Result<serde_json::Value, EvaluationError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.response
            .clone()
            .map_err(EvaluationError::RequestFailed)
    }
}
