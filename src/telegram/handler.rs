//! Telegram message handling.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::Message;

use crate::bot::{ConfirmationStore, ConversationKey, Dispatcher, Output, OutputSink};
use crate::error::{Error, Result};

/// Shared state handed to every message handler.
pub struct BotState {
    pub dispatcher: Arc<Dispatcher>,
    pub confirmations: ConfirmationStore,
    /// Chats allowed to talk to the bot. Empty allows every chat.
    pub allowed_chats: HashSet<i64>,
}

impl BotState {
    pub fn new(dispatcher: Arc<Dispatcher>, allowed_chats: HashSet<i64>) -> Self {
        Self {
            dispatcher,
            confirmations: ConfirmationStore::new(),
            allowed_chats,
        }
    }

    pub fn is_allowed(&self, chat_id: i64) -> bool {
        self.allowed_chats.is_empty() || self.allowed_chats.contains(&chat_id)
    }
}

/// Replies into one Telegram chat.
pub struct TelegramSink {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramSink {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl OutputSink for TelegramSink {
    async fn send(&self, output: Output) -> Result<()> {
        self.bot
            .send_message(self.chat_id, output.to_plain_text())
            .await
            .map_err(|e| Error::Telegram(e.to_string()))?;
        Ok(())
    }
}

/// Rewrite slash commands into the plain command form.
///
/// `/vs@mybot list` becomes `vs list` and `/help` becomes
/// `virtual server help`. Anything else is returned trimmed.
pub fn normalize_command(text: &str) -> String {
    let text = text.trim();
    let Some(rest) = text.strip_prefix('/') else {
        return text.to_string();
    };

    let (command, args) = match rest.split_once(char::is_whitespace) {
        Some((command, args)) => (command, args.trim()),
        None => (rest, ""),
    };
    // Group chats address commands as /cmd@botname.
    let command = command.split('@').next().unwrap_or(command);

    match command {
        "help" | "start" => "virtual server help".to_string(),
        "vs" if args.is_empty() => "virtual server help".to_string(),
        "vs" => format!("vs {}", args),
        _ => text.to_string(),
    }
}

/// Handle incoming messages.
pub async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let chat_id = msg.chat.id;
    if !state.is_allowed(chat_id.0) {
        tracing::warn!("Ignoring message from unlisted chat {}", chat_id.0);
        return Ok(());
    }

    let sender_id = msg
        .from
        .as_ref()
        .map(|u| u.id.0.to_string())
        .unwrap_or_else(|| "0".to_string());

    let command = normalize_command(text);
    let key = ConversationKey::new(chat_id.0, &sender_id);
    let sink = TelegramSink::new(bot.clone(), chat_id);

    match state
        .dispatcher
        .converse(key, &command, &state.confirmations, &sink)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!("No command in message from {}", sender_id);
        }
        Err(e) => {
            tracing::error!("Failed to handle message from {}: {}", sender_id, e);
            bot.send_message(chat_id, "Failed to process message. Please try again.")
                .await?;
        }
    }

    Ok(())
}
