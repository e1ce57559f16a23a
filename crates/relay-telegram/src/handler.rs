//! Telegram message handler registered in the teloxide Dispatcher.

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{debug, info, warn};

use relay_agent::pipeline::{handle_slash_command, process_message, PipelineError};
use relay_core::types::UserId;

use crate::markdown::escape_markdown_v2;
use crate::send::{self, ReplyFormatter};
use crate::typing::TypingIndicator;
use crate::TelegramAppContext;

/// Main message handler registered in the teloxide Dispatcher.
///
/// Runs for every incoming `Message`. Performs:
/// 1. Bot-message filter, sender and text extraction
/// 2. Slash command interception (`/start`, `/reset`, `/clear`, `/help`)
/// 3. Non-blocking relay pipeline invocation with a typing indicator
pub async fn handle_message<C: TelegramAppContext + 'static>(
    bot: Bot,
    msg: Message,
    ctx: Arc<C>,
    formatter: Arc<ReplyFormatter>,
) -> ResponseResult<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    if from.is_bot {
        return Ok(());
    }
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if text.trim().is_empty() {
        return Ok(());
    }

    let user = UserId::from(from.id.0);
    let chat_id = msg.chat.id;

    if let Some(reply) = handle_slash_command(text, ctx.as_ref(), &user) {
        send::send_reply(&bot, chat_id, &escape_markdown_v2(&reply)).await;
        return Ok(());
    }

    let text = text.to_string();
    tokio::spawn(async move {
        let typing = TypingIndicator::start(bot.clone(), chat_id);
        let result = process_message(ctx.as_ref(), &user, &text).await;
        drop(typing);

        let reply = match result {
            Ok(pm) => {
                info!(
                    user = %user,
                    model = %pm.model,
                    tokens_in = pm.tokens_in,
                    tokens_out = pm.tokens_out,
                    stop_reason = %pm.stop_reason,
                    "Telegram: relay turn complete"
                );
                formatter.format(&pm.content)
            }
            Err(e) => {
                warn!(error = %e, user = %user, "Telegram: relay pipeline failed");
                error_reply(&e)
            }
        };

        debug!(user = %user, len = reply.len(), "sending reply");
        send::send_reply(&bot, chat_id, &reply).await;
    });

    Ok(())
}

/// User-facing reply for a failed relay turn, already escaped.
pub fn error_reply(err: &PipelineError) -> String {
    let text = match err {
        PipelineError::Busy => "⏳ I'm still working on your previous message. \
                                Please wait for my reply before sending another one."
            .to_string(),
        PipelineError::Provider(e) if e.is_malformed() => {
            "🤔 Hmm, I couldn't process the AI response. Please try again or simplify your request!"
                .to_string()
        }
        PipelineError::Provider(e) => format!(
            "⚠️ I'm currently unavailable. Let me suggest:\n\
             - Check the model endpoint connection status\n\
             - Verify the API configuration\n\
             - Ensure the model hosting service is running\n\
             Error details: {e}"
        ),
    };
    escape_markdown_v2(&text)
}

#[cfg(test)]
mod tests {
    use relay_agent::ProviderError;

    use super::*;

    #[test]
    fn timeout_reply_lists_hints_and_detail() {
        let reply = error_reply(&PipelineError::Provider(ProviderError::Timeout { ms: 30_000 }));
        assert!(reply.starts_with("⚠️ I'm currently unavailable"));
        assert!(reply.contains("\\- Verify the API configuration"));
        assert!(reply.contains("30000ms"));
    }

    #[test]
    fn malformed_reply_is_could_not_process() {
        let reply = error_reply(&PipelineError::Provider(ProviderError::MalformedResponse(
            "no content".into(),
        )));
        assert!(reply.contains("couldn't process the AI response"));
        assert!(reply.ends_with("request\\!"));
    }

    #[test]
    fn busy_reply_is_escaped() {
        let reply = error_reply(&PipelineError::Busy);
        assert!(reply.contains("previous message\\."));
    }

    #[test]
    fn api_error_detail_is_escaped() {
        let reply = error_reply(&PipelineError::Provider(ProviderError::Api {
            status: 502,
            message: "bad_gateway (upstream)".into(),
        }));
        assert!(reply.contains("\\(502\\)"));
        assert!(reply.contains("bad\\_gateway \\(upstream\\)"));
    }
}
