/// Errors surfaced by [`TelegramAdapter::run`](crate::TelegramAdapter::run).
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("Telegram request failed: {0}")]
    Teloxide(#[from] teloxide::RequestError),

    #[error("telegram.bot_token is empty")]
    NoToken,
}
