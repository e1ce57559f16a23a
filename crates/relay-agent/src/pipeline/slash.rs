//! Built-in slash commands, intercepted before the relay pipeline.
//!
//! Replies are plain text; the channel adapter applies its own escaping.

use tracing::info;

use relay_core::types::UserId;

use crate::pipeline::MessageContext;

/// Reduce `/Start@my_bot args` to `/start`.
fn command_name(message: &str) -> Option<String> {
    let first = message.trim().split_whitespace().next()?;
    if !first.starts_with('/') {
        return None;
    }
    let name = first.split('@').next().unwrap_or(first);
    Some(name.to_ascii_lowercase())
}

/// Handle built-in commands before sending anything to the endpoint.
///
/// Returns `Some(reply)` if the message was a recognized command,
/// `None` if it should go through the relay pipeline.
///
/// Recognized commands:
///   `/start`           fresh session plus a greeting
///   `/reset`, `/clear` drop the conversation history
///   `/help`            list commands
pub fn handle_slash_command<C: MessageContext + ?Sized>(
    message: &str,
    ctx: &C,
    user: &UserId,
) -> Option<String> {
    let name = command_name(message)?;

    match name.as_str() {
        "/start" => {
            ctx.cache().reset(user);
            info!(user = %user, "session started");
            Some(format!(
                "🚀 Hello! I'm powered by {} and ready to help you on Telegram.\n\
                 🧠 Model features: Contextual understanding, Code generation, Multi-language support\n\n\
                 Type any message to get started!",
                ctx.agent().model()
            ))
        }
        "/reset" | "/clear" => {
            let existed = ctx.cache().reset(user);
            info!(user = %user, existed, "session reset by user");
            Some("🧹 Conversation cleared. Starting a fresh conversation.".to_string())
        }
        "/help" => Some(
            "Commands:\n\
             /start - start a new conversation\n\
             /reset - forget the current conversation (alias: /clear)\n\
             /help - show this help\n\n\
             Anything else is sent to the AI together with the conversation so far."
                .to_string(),
        ),
        _ => None,
    }
}
