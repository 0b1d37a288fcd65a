//! Scripted provider for tests.

use super::provider::{EvalRequest, ProviderConfig, ProviderResponse, VisionProvider};
use crate::error::{ProviderError, ProviderResult};
use crate::types::{FinishReason, TokenUsage};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

type ResponseFn = Box<dyn Fn(u32) -> ProviderResult<ProviderResponse> + Send + Sync>;

pub(crate) struct MockProvider {
    /// Factory that produces a response for each call index.
    response_fn: ResponseFn,
    /// Tracks how many times `evaluate` was called (shared for post-hoc assertions).
    pub(crate) call_count: Arc<AtomicU32>,
    /// Optional delay before returning.
    delay: Option<Duration>,
}

impl MockProvider {
    pub(crate) fn new(
        response_fn: impl Fn(u32) -> ProviderResult<ProviderResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            response_fn: Box::new(response_fn),
            call_count: Arc::new(AtomicU32::new(0)),
            delay: None,
        }
    }

    pub(crate) fn success(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(response(&text, Some(FinishReason::Stop))))
    }

    pub(crate) fn failing(error: fn(u32) -> ProviderError) -> Self {
        Self::new(move |idx| Err(error(idx)))
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

/// A provider response with plausible usage numbers.
pub(crate) fn response(text: &str, finish_reason: Option<FinishReason>) -> ProviderResponse {
    ProviderResponse {
        text: text.to_string(),
        finish_reason,
        native_finish_reason: finish_reason.map(|r| r.as_str().to_string()),
        usage: Some(TokenUsage::from_counts(Some(900), Some(42), None, Some(942))),
        model: "mock-vlm".to_string(),
        latency_ms: 10,
        raw: serde_json::json!({ "mock": true, "text": text }),
    }
}

pub(crate) fn transient(status: u16) -> ProviderError {
    ProviderError::Transient {
        message: format!("mock HTTP {status}"),
        status_code: Some(status),
    }
}

pub(crate) fn terminal(status: u16) -> ProviderError {
    ProviderError::Terminal {
        message: format!("mock HTTP {status}"),
        status_code: Some(status),
    }
}

#[async_trait]
impl VisionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn evaluate(
        &self,
        _request: &EvalRequest,
        _config: &ProviderConfig,
    ) -> ProviderResult<ProviderResponse> {
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.response_fn)(idx)
    }
}
