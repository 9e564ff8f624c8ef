//! Intent dispatch.
//!
//! The [`Dispatcher`] is the single consumer of [`Intent`]s, whichever
//! adapter produced them. Destructive intents stop at the confirmation gate
//! and come back as [`Dispatch::AwaitConfirmation`]; the caller parks the
//! pending state and later hands the reply to [`Dispatcher::resolve`].

use async_trait::async_trait;
use std::sync::Arc;

use super::activity::{ActivitySink, ACTIVITY_LIST};
use super::catalog::Catalog;
use super::confirm::{self, ConfirmationStore, ConversationKey, PendingConfirmation, Resolution};
use super::entities::KnownNames;
use super::format::{self, Output};
use super::intent::{self, Intent, IntentEvent, ParseError, Verb};
use crate::compute::{act_by_name, ActionError, ComputeClient, ServerAction};
use crate::error::Result;

/// Where the bot's replies go.
#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn send(&self, output: Output) -> Result<()>;
}

/// What happened to an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Done,
    AwaitConfirmation(PendingConfirmation),
}

pub struct Dispatcher {
    client: Arc<dyn ComputeClient>,
    catalog: Catalog,
    names: KnownNames,
    activity: Arc<dyn ActivitySink>,
    bot_name: String,
}

impl Dispatcher {
    pub fn new(
        client: Arc<dyn ComputeClient>,
        catalog: Catalog,
        names: KnownNames,
        activity: Arc<dyn ActivitySink>,
        bot_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            catalog,
            names,
            activity,
            bot_name: bot_name.into(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Text adapter. `None` when the text is not a bot command.
    pub async fn handle_text(&self, text: &str, sink: &dyn OutputSink) -> Result<Option<Dispatch>> {
        let Some(intent) = intent::parse_text(text) else {
            return Ok(None);
        };
        tracing::debug!(?intent, "Text match");
        self.dispatch(intent, sink).await.map(Some)
    }

    /// Structured event adapter. `None` when the event is not ours.
    pub async fn handle_event(
        &self,
        event: &IntentEvent,
        sink: &dyn OutputSink,
    ) -> Result<Option<Dispatch>> {
        match intent::parse_event(event) {
            Ok(intent) => {
                tracing::debug!(?intent, "Natural language match");
                self.dispatch(intent, sink).await.map(Some)
            }
            Err(ParseError::MissingTarget(verb)) => {
                tracing::error!(event = %event.name, "Could not extract virtual server name");
                sink.send(Output::message(
                    self.catalog.t(&verb.parse_problem_key(), &[]),
                ))
                .await?;
                Ok(Some(Dispatch::Done))
            }
            Err(ParseError::UnknownEvent(name)) => {
                tracing::debug!(event = %name, "Ignoring unknown event");
                Ok(None)
            }
        }
    }

    pub async fn dispatch(&self, intent: Intent, sink: &dyn OutputSink) -> Result<Dispatch> {
        match intent.verb() {
            Verb::Help => {
                tracing::info!("Listing virtual server help");
                let help = format::help_text(&self.bot_name, &self.catalog);
                sink.send(Output::message(help)).await?;
                Ok(Dispatch::Done)
            }
            Verb::List => {
                self.list(sink).await?;
                Ok(Dispatch::Done)
            }
            verb => {
                let (Some(action), Some(name)) = (verb.action(), intent.target()) else {
                    return Ok(Dispatch::Done);
                };
                if action.needs_confirmation() {
                    return self.propose(action, name, sink).await;
                }
                tracing::info!("Running {} of virtual server {}", action, name);
                sink.send(Output::message(
                    self.catalog.t(&format!("vs.{}.in.progress", action), &[name]),
                ))
                .await?;
                self.run(action, name, sink).await?;
                Ok(Dispatch::Done)
            }
        }
    }

    /// Second phase of the confirmation gate.
    pub async fn resolve(
        &self,
        pending: PendingConfirmation,
        affirmative: bool,
        sink: &dyn OutputSink,
    ) -> Result<()> {
        match confirm::resolve(pending, affirmative) {
            Resolution::Declined { message } => {
                tracing::info!("Confirmation declined");
                sink.send(Output::message(message)).await
            }
            Resolution::Proceed { action, name } => {
                if action == ServerAction::Stop {
                    sink.send(Output::message(
                        self.catalog.t("vs.stop.in.progress", &[&name]),
                    ))
                    .await?;
                }
                self.run(action, &name, sink).await
            }
        }
    }

    /// Route one chat message from `key`, answering any confirmation it owes.
    ///
    /// Returns `false` when the message was neither a reply nor a command.
    pub async fn converse(
        &self,
        key: ConversationKey,
        text: &str,
        store: &ConfirmationStore,
        sink: &dyn OutputSink,
    ) -> Result<bool> {
        if let Some(pending) = store.take(&key).await {
            let affirmative = confirm::is_affirmative(text);
            tracing::debug!(id = %pending.id, affirmative, "Confirmation reply");
            self.resolve(pending, affirmative, sink).await?;
            return Ok(true);
        }

        match self.handle_text(text, sink).await? {
            Some(Dispatch::AwaitConfirmation(pending)) => {
                store.insert(key, pending).await;
                Ok(true)
            }
            Some(Dispatch::Done) => Ok(true),
            None => Ok(false),
        }
    }

    async fn propose(
        &self,
        action: ServerAction,
        name: &str,
        sink: &dyn OutputSink,
    ) -> Result<Dispatch> {
        tracing::info!("Asking to confirm {} of virtual server {}", action, name);
        let pending = confirm::propose(action, name, &self.catalog);
        sink.send(Output::message(pending.prompt.clone())).await?;
        Ok(Dispatch::AwaitConfirmation(pending))
    }

    async fn list(&self, sink: &dyn OutputSink) -> Result<()> {
        tracing::info!("Listing virtual servers");
        match self.client.list_servers().await {
            Ok(servers) => {
                tracing::info!("Result of {} virtual servers", servers.len());
                if !servers.is_empty() {
                    self.names.update(&servers).await;
                }
                sink.send(format::format_servers(&servers, &self.catalog))
                    .await?;
                self.activity.emit(ACTIVITY_LIST).await;
            }
            Err(e) => {
                tracing::error!("An error occurred listing virtual servers: {}", e);
                sink.send(Output::message(self.catalog.t("vs.list.failure", &[])))
                    .await?;
            }
        }
        Ok(())
    }

    async fn run(&self, action: ServerAction, name: &str, sink: &dyn OutputSink) -> Result<()> {
        let outcome = act_by_name(self.client.as_ref(), action, name).await;

        match &outcome {
            Ok(_) => tracing::info!("{} of virtual server {} successful", action, name),
            Err(ActionError::NotFound(_)) => {
                tracing::error!("{} of virtual server {} failed. Server was not found", action, name)
            }
            Err(e) => tracing::error!("{} of virtual server {} failed: {}", action, name, e),
        }

        sink.send(format::format_outcome(action, name, &outcome, &self.catalog))
            .await?;

        if outcome.is_ok() {
            self.activity.emit(action.activity_id()).await;
            if action == ServerAction::Start {
                self.refresh_names_in_background();
            }
        }
        Ok(())
    }

    fn refresh_names_in_background(&self) {
        let names = self.names.clone();
        let client = self.client.clone();
        tokio::spawn(async move {
            if let Err(e) = names.refresh(client.as_ref()).await {
                tracing::warn!("Failed to refresh known server names: {}", e);
            }
        });
    }
}
