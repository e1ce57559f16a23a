use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use relay_agent::openai::OpenAiProvider;
use relay_agent::runtime::AgentRuntime;
use relay_core::config::RelayConfig;
use relay_sessions::{CacheLimits, ConversationCache};
use relay_telegram::TelegramAdapter;

mod app;

use app::AppState;

/// Telegram bot that relays chat history to an OpenAI-compatible completion endpoint.
#[derive(Parser, Debug)]
#[command(name = "relay-bot", version, about)]
struct Cli {
    /// Path to the TOML config file (falls back to RELAY_CONFIG, then relay.toml)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_bot=info,relay_telegram=info,relay_agent=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Missing credentials are fatal.
    let config = RelayConfig::load(cli.config.as_deref()).context("loading configuration")?;

    let provider = OpenAiProvider::from_config(&config.completion)
        .context("building completion client")?;
    let agent = AgentRuntime::from_config(Box::new(provider), &config.completion);
    let cache = ConversationCache::new(
        config.completion.system_prompt.clone(),
        CacheLimits::from_config(&config.cache),
    );

    info!(
        model = %agent.model(),
        endpoint = %config.completion.endpoint,
        max_users = config.cache.max_users,
        "relay bot starting"
    );

    let state = Arc::new(AppState::new(config, agent, cache));

    TelegramAdapter::new(&state.config.telegram, Arc::clone(&state))
        .run(shutdown_signal())
        .await
        .context("telegram adapter")?;

    info!(sessions = state.cache.len(), "relay bot stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM (Ctrl-C elsewhere).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(term), Ok(int)) => (term, int),
            _ => {
                tracing::warn!("failed to install unix signal handlers, using ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received Ctrl-C");
    }
}
