//! Typing indicator shown while the completion endpoint is working.
//!
//! Telegram clears the typing status after ~5 seconds, so it is re-sent every
//! 4 seconds until the indicator is dropped.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tokio::task::JoinHandle;

const REFRESH: Duration = Duration::from_secs(4);

/// Keeps "typing…" visible in a chat for as long as it is alive.
pub struct TypingIndicator {
    task: JoinHandle<()>,
}

impl TypingIndicator {
    pub fn start(bot: Bot, chat_id: ChatId) -> Self {
        let task = tokio::spawn(async move {
            loop {
                if let Err(e) = bot.send_chat_action(chat_id, ChatAction::Typing).await {
                    tracing::debug!(error = %e, "typing indicator failed");
                }
                tokio::time::sleep(REFRESH).await;
            }
        });
        Self { task }
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        self.task.abort();
    }
}
