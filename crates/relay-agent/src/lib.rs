pub mod openai;
pub mod pipeline;
pub mod provider;
pub mod runtime;

pub use provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
pub use runtime::AgentRuntime;
