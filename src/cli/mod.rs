//! CLI commands for vsbot using clap.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::bot::activity::TracingActivity;
use crate::bot::entities::{KnownNames, MemoryEntityStore};
use crate::bot::{
    Catalog, Dispatch, Dispatcher, IntentEvent, Output, OutputSink, PendingConfirmation,
};
use crate::compute;
use crate::config::Settings;

/// vsbot - manage virtual servers from chat.
#[derive(Parser)]
#[command(name = "vsbot")]
#[command(version)]
#[command(about = "vsbot - list, start, stop, reboot and destroy virtual servers from chat", long_about = None)]
pub struct Commands {
    /// Print formatter events as JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the Telegram bot
    Run {
        /// Telegram bot token
        #[arg(long, env = "VSBOT_TELEGRAM_TOKEN", hide_env_values = true)]
        token: String,

        /// Chat ids allowed to use the bot (comma separated). Empty allows all.
        #[arg(long = "allow-chat", env = "VSBOT_TELEGRAM_CHATS", value_delimiter = ',')]
        allowed_chats: Vec<i64>,
    },

    /// Run one chat command, e.g. "virtual server list"
    Exec {
        /// Command text
        text: String,
    },

    /// Handle a structured intent event given as JSON
    Event {
        /// Event, e.g. '{"name":"serverlifecycle.start","parameters":{"vsname":"web"}}'
        json: String,
    },

    /// Refresh and print the known server names
    Names,
}

impl Commands {
    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        let settings = Settings::from_env()?;
        let sink = ConsoleSink { json: self.json };

        match &self.command {
            Command::Run {
                token,
                allowed_chats,
            } => cmd_run(&settings, token, allowed_chats).await,
            Command::Exec { text } => cmd_exec(&settings, text, &sink).await,
            Command::Event { json } => cmd_event(&settings, json, &sink).await,
            Command::Names => cmd_names(&settings).await,
        }
    }
}

/// Writes bot output to stdout.
struct ConsoleSink {
    json: bool,
}

#[async_trait]
impl OutputSink for ConsoleSink {
    async fn send(&self, output: Output) -> crate::error::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(&output)?);
        } else {
            println!("{}", output.to_plain_text());
        }
        Ok(())
    }
}

fn build_dispatcher(settings: &Settings) -> Result<Dispatcher> {
    let client = compute::create_client(settings)?;
    let catalog = Catalog::for_locale(&settings.locale)?;
    let names = KnownNames::new(Arc::new(MemoryEntityStore::new()));

    tracing::info!(provider = client.name(), "Compute client ready");

    Ok(Dispatcher::new(
        client,
        catalog,
        names,
        Arc::new(TracingActivity),
        settings.bot_name.clone(),
    ))
}

// Command implementations

async fn cmd_run(settings: &Settings, token: &str, allowed_chats: &[i64]) -> Result<()> {
    let dispatcher = Arc::new(build_dispatcher(settings)?);
    let allowed: HashSet<i64> = allowed_chats.iter().copied().collect();
    crate::telegram::run_telegram_daemon(token.to_string(), dispatcher, allowed).await?;
    Ok(())
}

async fn cmd_exec(settings: &Settings, text: &str, sink: &ConsoleSink) -> Result<()> {
    let dispatcher = build_dispatcher(settings)?;
    match dispatcher.handle_text(text, sink).await? {
        Some(Dispatch::AwaitConfirmation(pending)) => confirm_on_stdin(&dispatcher, pending, sink).await,
        Some(Dispatch::Done) => Ok(()),
        None => {
            let help = crate::bot::format::help_text(&settings.bot_name, dispatcher.catalog());
            anyhow::bail!("not a virtual server command: '{}'{}", text, help)
        }
    }
}

async fn cmd_event(settings: &Settings, json: &str, sink: &ConsoleSink) -> Result<()> {
    let event: IntentEvent = serde_json::from_str(json).context("invalid event JSON")?;
    let dispatcher = build_dispatcher(settings)?;
    match dispatcher.handle_event(&event, sink).await? {
        Some(Dispatch::AwaitConfirmation(pending)) => confirm_on_stdin(&dispatcher, pending, sink).await,
        Some(Dispatch::Done) => Ok(()),
        None => Err(crate::error::Error::Event(format!("unknown event '{}'", event.name)).into()),
    }
}

async fn cmd_names(settings: &Settings) -> Result<()> {
    let client = compute::create_client(settings)?;
    let names = KnownNames::new(Arc::new(MemoryEntityStore::new()));
    for name in names.refresh(client.as_ref()).await? {
        println!("{}", name);
    }
    Ok(())
}

/// Wait for the user's answer on stdin. End of input leaves the action undone.
async fn confirm_on_stdin(
    dispatcher: &Dispatcher,
    pending: PendingConfirmation,
    sink: &ConsoleSink,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    match lines.next_line().await? {
        Some(reply) => {
            let affirmative = crate::bot::confirm::is_affirmative(&reply);
            dispatcher.resolve(pending, affirmative, sink).await?;
        }
        None => {
            tracing::info!(id = %pending.id, "No reply to confirmation; nothing done");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exec() {
        let cmds = Commands::try_parse_from(["vsbot", "--json", "exec", "vs list"]).unwrap();
        assert!(cmds.json);
        assert!(matches!(cmds.command, Command::Exec { ref text } if text == "vs list"));
    }

    #[test]
    fn test_parse_run_chats() {
        let cmds = Commands::try_parse_from([
            "vsbot",
            "run",
            "--token",
            "abc",
            "--allow-chat",
            "1,-1002",
        ])
        .unwrap();
        match cmds.command {
            Command::Run {
                token,
                allowed_chats,
            } => {
                assert_eq!(token, "abc");
                assert_eq!(allowed_chats, vec![1, -1002]);
            }
            _ => panic!("expected run"),
        }
    }
}
