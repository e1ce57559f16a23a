use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Telegram rejects messages longer than this (counted in UTF-16 code units).
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONFIG_PATH: &str = "relay.toml";
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "qwen/qwen3-1.7b:free";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Qwen3 1.7B, a powerful AI developed by Tongyi Lab. \
Provide clear, concise, and accurate responses with proper formatting. Your role is a Telegram bot assistant. \
Use code blocks for code suggestions and maintain a helpful tone. Offer suggestions for the user.";

pub const DEFAULT_FOOTER: &str = "\n--------------------\n\nThank you for using this AI chatbot 😊";

/// Environment variable names from older `.env` deployments, mapped onto
/// config keys.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("HTTP_API", "telegram.bot_token"),
    ("OPENROUTER_API_KEY", "completion.api_key"),
    ("QWEN3_API_ENDPOINT", "completion.endpoint"),
    ("OPENROUTER_REFERRER", "completion.referer"),
    ("OPENROUTER_APP_NAME", "completion.app_title"),
];

/// Top-level config (relay.toml + legacy env names + RELAY_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub completion: CompletionConfig,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Completion endpoint (OpenRouter or any OpenAI-compatible chat/completions URL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Full chat completions URL, not a base URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Sent as `HTTP-Referer` so OpenRouter can attribute the traffic.
    #[serde(default = "default_referer")]
    pub referer: String,
    /// Sent as `X-Title`.
    #[serde(default = "default_app_title")]
    pub app_title: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_frequency_penalty")]
    pub frequency_penalty: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Seeded as the first (system) turn of every new conversation.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Plain text appended to every reply. Escaped for MarkdownV2 at startup.
    #[serde(default = "default_footer")]
    pub footer: String,
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
    #[serde(default)]
    pub truncation: TruncationMode,
}

/// How an over-long reply is cut down to `max_message_len`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncationMode {
    /// Shorten the raw text before escaping and keep the footer, so escape
    /// pairs and code fences are never split.
    #[default]
    Safe,
    /// Cut the escaped message at `max - 6` and append `...`. May split an
    /// escape pair or leave a fence open.
    Blind,
}

/// Bounds on the in-memory conversation cache. `0` disables a bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of users with a live history. The least recently
    /// active user is evicted when a new one would exceed it.
    #[serde(default = "default_max_users")]
    pub max_users: usize,
    /// Histories idle for longer than this are dropped and reseeded.
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_users: default_max_users(),
            idle_ttl_secs: default_idle_ttl_secs(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_referer() -> String {
    "https://github.com/Sovitou/telegram-chatbot".to_string()
}
fn default_app_title() -> String {
    "Telegram-AI-Bot".to_string()
}
fn default_temperature() -> f32 {
    0.8
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_top_p() -> f32 {
    0.8
}
fn default_frequency_penalty() -> f32 {
    0.2
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}
fn default_footer() -> String {
    DEFAULT_FOOTER.to_string()
}
fn default_max_message_len() -> usize {
    TELEGRAM_MAX_MESSAGE_LEN
}
fn default_max_users() -> usize {
    10_000
}
fn default_idle_ttl_secs() -> u64 {
    24 * 60 * 60
}

/// Map a legacy environment variable name to its config key.
fn legacy_env_key(name: &str) -> Option<&'static str> {
    LEGACY_ENV_KEYS
        .iter()
        .find(|(env, _)| env.eq_ignore_ascii_case(name))
        .map(|(_, key)| *key)
}

impl RelayConfig {
    /// Load config from a TOML file with env var overrides.
    ///
    /// File path, in order: explicit argument, `RELAY_CONFIG`, `./relay.toml`.
    /// A missing file is not an error; the required keys can come from env.
    /// Env precedence (lowest to highest): legacy names (`HTTP_API`,
    /// `OPENROUTER_API_KEY`, ...), then `RELAY_*` with `__` between sections,
    /// e.g. `RELAY_TELEGRAM__BOT_TOKEN`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("RELAY_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        tracing::debug!(path = %path, "loading relay config");

        let figment = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::raw().filter_map(|key| legacy_env_key(key.as_str()).map(Into::into)))
            .merge(Env::prefixed("RELAY_").split("__"));

        Self::from_figment(figment)
    }

    /// Extract and validate from an already-assembled figment.
    pub fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        let config: RelayConfig = figment
            .extract()
            .map_err(|e| crate::error::RelayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::error::Result<()> {
        use crate::error::RelayError;

        if self.completion.api_key.trim().is_empty() {
            return Err(RelayError::Config("completion.api_key must not be empty".into()));
        }
        if self.telegram.bot_token.trim().is_empty() {
            return Err(RelayError::Config("telegram.bot_token must not be empty".into()));
        }
        if !self.completion.endpoint.starts_with("http://")
            && !self.completion.endpoint.starts_with("https://")
        {
            return Err(RelayError::Config(format!(
                "completion.endpoint is not an http(s) URL: {}",
                self.completion.endpoint
            )));
        }
        if self.completion.timeout_secs == 0 {
            return Err(RelayError::Config("completion.timeout_secs must be > 0".into()));
        }
        // Room for at least the ellipsis plus some text.
        if self.telegram.max_message_len <= 16 {
            return Err(RelayError::Config(format!(
                "telegram.max_message_len too small: {}",
                self.telegram.max_message_len
            )));
        }
        Ok(())
    }
}
