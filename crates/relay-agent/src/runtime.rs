use std::time::{Duration, Instant};

use tracing::info;

use relay_core::config::CompletionConfig;
use relay_core::types::ConversationTurn;

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError, SamplingParams};

/// Holds the completion provider plus everything needed to build a request:
/// model, sampling parameters and the per-request timeout.
/// Shared across message tasks via the host's `Arc`.
pub struct AgentRuntime {
    provider: Box<dyn LlmProvider>,
    model: String,
    sampling: SamplingParams,
    timeout: Duration,
}

impl AgentRuntime {
    pub fn new(
        provider: Box<dyn LlmProvider>,
        model: String,
        sampling: SamplingParams,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            model,
            sampling,
            timeout,
        }
    }

    pub fn from_config(provider: Box<dyn LlmProvider>, config: &CompletionConfig) -> Self {
        Self::new(
            provider,
            config.model.clone(),
            SamplingParams {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
                top_p: config.top_p,
                frequency_penalty: config.frequency_penalty,
            },
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn build_request(&self, messages: Vec<ConversationTurn>) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages,
            sampling: self.sampling,
        }
    }

    /// Send the conversation and wait for the assistant reply.
    ///
    /// The whole call is bounded by the runtime timeout regardless of what
    /// the provider does internally; expiry yields `ProviderError::Timeout`.
    pub async fn chat(&self, messages: Vec<ConversationTurn>) -> Result<ChatResponse, ProviderError> {
        let req = self.build_request(messages);
        info!(
            model = %req.model, provider = %self.provider.name(),
            turns = req.messages.len(), "processing chat request"
        );

        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.provider.send(&req)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                ms: self.timeout.as_millis() as u64,
            }),
        };

        match &result {
            Ok(resp) => info!(
                model = %resp.model,
                tokens_in = resp.tokens_in,
                tokens_out = resp.tokens_out,
                latency_ms = started.elapsed().as_millis() as u64,
                "chat request complete"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                latency_ms = started.elapsed().as_millis() as u64,
                "chat request failed"
            ),
        }

        result
    }
}
