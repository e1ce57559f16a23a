//! One relay turn: user text in, assistant text out.
//!
//! `process_message` runs the whole turn: in-flight guard → seed/load
//! history → append user turn → completion call → append assistant turn.
//! Formatting for the platform is left to the caller.

use tracing::{debug, info};

use relay_core::types::{ConversationTurn, UserId};

use crate::provider::ProviderError;

use super::context::MessageContext;

/// Result of a completed relay turn.
#[derive(Debug, Clone)]
pub struct ProcessedMessage {
    /// Assistant reply, as returned by the endpoint.
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub stop_reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Another message from the same user is still waiting on the endpoint.
    #[error("a reply for this user is still in progress")]
    Busy,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Run one relay turn for `user`.
///
/// Failure semantics:
/// - `Busy`: nothing is touched, the text is not appended.
/// - `Provider(_)`: the user turn stays in history but no assistant turn is
///   added. There are no retries, so the message is simply spent.
pub async fn process_message<C: MessageContext + ?Sized>(
    ctx: &C,
    user: &UserId,
    text: &str,
) -> Result<ProcessedMessage, PipelineError> {
    let Some(_guard) = ctx.cache().try_acquire(user) else {
        info!(user = %user, "request already in flight, rejecting message");
        return Err(PipelineError::Busy);
    };

    ctx.cache().append(user, ConversationTurn::user(text));
    let messages = ctx.cache().get_or_create(user);

    let resp = ctx.agent().chat(messages).await?;

    if !ctx
        .cache()
        .append_if_present(user, ConversationTurn::assistant(resp.content.clone()))
    {
        debug!(user = %user, "history was reset while waiting, reply not recorded");
    }

    Ok(ProcessedMessage {
        content: resp.content,
        model: resp.model,
        tokens_in: resp.tokens_in,
        tokens_out: resp.tokens_out,
        stop_reason: resp.stop_reason,
    })
}
