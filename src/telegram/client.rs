//! Telegram bot client - simple polling version.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;

use super::handler::{handle_message, BotState};
use crate::bot::Dispatcher;
use crate::error::{Error, Result};

/// Unanswered confirmations are swept after this long.
const CONFIRMATION_MAX_AGE_MS: i64 = 15 * 60 * 1000;
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Run the telegram bot daemon using simple polling.
pub async fn run_telegram_daemon(
    token: String,
    dispatcher: Arc<Dispatcher>,
    allowed_chats: HashSet<i64>,
) -> Result<()> {
    tracing::info!("Starting Telegram bot...");

    if token.trim().is_empty() {
        return Err(Error::Telegram("No bot token configured".to_string()));
    }
    if allowed_chats.is_empty() {
        tracing::warn!("No chat allowlist configured; every chat can control servers");
    }

    let bot = Bot::new(token);

    if let Err(e) = bot
        .set_my_commands(vec![
            teloxide::types::BotCommand::new("vs", "Virtual server command, e.g. /vs list"),
            teloxide::types::BotCommand::new("help", "Show help"),
        ])
        .await
    {
        tracing::warn!("Failed to set commands: {}", e);
    }

    let state = Arc::new(BotState::new(dispatcher, allowed_chats));

    let sweeper = {
        let state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                ticker.tick().await;
                let removed = state.confirmations.cleanup(CONFIRMATION_MAX_AGE_MS).await;
                if removed > 0 {
                    tracing::info!("Dropped {} unanswered confirmations", removed);
                }
            }
        })
    };

    teloxide::repl(bot, move |bot: Bot, msg: Message| {
        let state = state.clone();
        async move { handle_message(bot, msg, state).await }
    })
    .await;

    sweeper.abort();
    tracing::info!("Telegram bot stopped");
    Ok(())
}
