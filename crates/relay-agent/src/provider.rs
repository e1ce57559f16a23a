use async_trait::async_trait;
use serde::Serialize;

use relay_core::types::ConversationTurn;

/// Sampling parameters forwarded verbatim to the completion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_tokens: 4096,
            top_p: 0.8,
            frequency_penalty: 0.2,
        }
    }
}

/// Request to an LLM provider.
///
/// `messages` is the full conversation, system turn first.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ConversationTurn>,
    #[serde(flatten)]
    pub sampling: SamplingParams,
}

/// Response from an LLM provider (non-streaming).
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// The assistant turn exactly as returned, never empty.
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub stop_reason: String,
}

/// Common interface for completion backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    /// Send a non-streaming chat request, wait for full response.
    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },
}

impl ProviderError {
    /// `true` when the endpoint answered successfully but without usable
    /// content. Everything else counts as the endpoint being unavailable.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ProviderError::MalformedResponse(_) | ProviderError::Parse(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            ProviderError::Timeout { .. } => true,
            ProviderError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}
