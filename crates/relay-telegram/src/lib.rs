pub mod adapter;
pub mod error;
pub mod handler;
pub mod markdown;
pub mod send;
pub mod typing;

pub use adapter::TelegramAdapter;
pub use error::TelegramError;
pub use send::ReplyFormatter;

/// Context interface the Telegram adapter needs from its host.
pub use relay_agent::pipeline::MessageContext as TelegramAppContext;
