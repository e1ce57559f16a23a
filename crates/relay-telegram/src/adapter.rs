//! Telegram channel adapter.
//!
//! Wraps a teloxide `Bot` + `Dispatcher` and drives the long-polling event loop
//! until the shutdown future resolves. Long polling, no public URL required.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use teloxide::dispatching::ShutdownToken;
use teloxide::prelude::*;
use tracing::{debug, info};

use relay_core::config::TelegramConfig;

use crate::error::TelegramError;
use crate::handler::handle_message;
use crate::send::ReplyFormatter;
use crate::TelegramAppContext;

pub struct TelegramAdapter<C: TelegramAppContext + 'static> {
    ctx: Arc<C>,
    config: TelegramConfig,
}

impl<C: TelegramAppContext + 'static> TelegramAdapter<C> {
    pub fn new(config: &TelegramConfig, ctx: Arc<C>) -> Self {
        Self {
            ctx,
            config: config.clone(),
        }
    }

    /// Connect to Telegram and poll for updates.
    ///
    /// Returns once `shutdown` has resolved and in-flight update handlers
    /// have finished. Relay turns already spawned in the background are not
    /// awaited.
    pub async fn run<F>(self, shutdown: F) -> Result<(), TelegramError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.config.bot_token.trim().is_empty() {
            return Err(TelegramError::NoToken);
        }
        let bot = Bot::new(&self.config.bot_token);
        let formatter = Arc::new(ReplyFormatter::from_config(&self.config));

        let handler = Update::filter_message().endpoint(handle_message::<C>);

        let mut dispatcher = Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![Arc::clone(&self.ctx), formatter])
            .default_handler(|_upd| async {})
            .build();

        let token = dispatcher.shutdown_token();
        tokio::spawn(async move {
            shutdown.await;
            info!("Telegram: stopping dispatcher");
            stop_dispatcher(token).await;
        });

        info!("Telegram: starting long-polling dispatcher");
        dispatcher.dispatch().await;
        info!("Telegram: dispatcher stopped");
        Ok(())
    }
}

const SHUTDOWN_RETRY: Duration = Duration::from_millis(100);

/// Request a dispatcher shutdown and wait for it to complete.
///
/// A dispatcher that has not started polling yet rejects the request, so it
/// is repeated until the dispatcher is running.
async fn stop_dispatcher(token: ShutdownToken) {
    loop {
        match token.shutdown() {
            Ok(done) => {
                done.await;
                return;
            }
            Err(_) => {
                debug!("Telegram: dispatcher not running yet, retrying shutdown");
                tokio::time::sleep(SHUTDOWN_RETRY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_keeps_waiting_for_idle_dispatcher() {
        let handler = Update::filter_message()
            .endpoint(|| async { Ok::<(), teloxide::RequestError>(()) });
        let dispatcher = Dispatcher::builder(Bot::new("123:test"), handler).build();

        let stop = tokio::spawn(stop_dispatcher(dispatcher.shutdown_token()));
        tokio::time::sleep(SHUTDOWN_RETRY * 3).await;
        assert!(!stop.is_finished(), "shutdown must not be dropped before dispatch starts");
        stop.abort();
    }
}
