use relay_agent::pipeline::MessageContext;
use relay_agent::runtime::AgentRuntime;
use relay_core::config::RelayConfig;
use relay_sessions::ConversationCache;

/// Central shared state, passed as `Arc<AppState>` to the Telegram handlers.
pub struct AppState {
    pub config: RelayConfig,
    pub agent: AgentRuntime,
    pub cache: ConversationCache,
}

impl AppState {
    pub fn new(config: RelayConfig, agent: AgentRuntime, cache: ConversationCache) -> Self {
        Self {
            config,
            agent,
            cache,
        }
    }
}

impl MessageContext for AppState {
    fn agent(&self) -> &AgentRuntime {
        &self.agent
    }

    fn cache(&self) -> &ConversationCache {
        &self.cache
    }
}
