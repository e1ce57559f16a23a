//! Shared context interface for channel adapters.

use relay_sessions::ConversationCache;

use crate::runtime::AgentRuntime;

/// Minimal context interface required by the shared message pipeline.
///
/// Implemented by `AppState` in `relay-bot`. Defined here so channel crates
/// depend only on `relay-agent`, never on the binary.
pub trait MessageContext: Send + Sync {
    fn agent(&self) -> &AgentRuntime;
    fn cache(&self) -> &ConversationCache;
}
