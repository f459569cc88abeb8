//! LLM provider abstraction
//!
//! The transport itself lives outside this crate; this module only defines
//! what goes over it and what comes back.

mod error;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use types::*;

use crate::runtime::LlmClient;
use async_trait::async_trait;
use std::sync::Arc;

/// Logging wrapper for LLM clients
pub struct LoggingClient {
    inner: Arc<dyn LlmClient>,
    model_id: String,
}

impl LoggingClient {
    pub fn new(inner: Arc<dyn LlmClient>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmClient for LoggingClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    step = %request.step,
                    duration_ms = %duration.as_millis(),
                    messages = request.messages.len(),
                    empty = response.is_empty(),
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    step = %request.step,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "LLM request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
