//! Name-based server actions.
//!
//! Every action takes a fresh snapshot of the provider's servers, resolves
//! the target name against it, and then acts on the provider identifier of
//! the single match.

use std::fmt;
use thiserror::Error;

use super::provider::{ComputeClient, ComputeError, Server};

/// Mutating server operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerAction {
    Start,
    Stop,
    Reboot,
    Destroy,
}

impl ServerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerAction::Start => "start",
            ServerAction::Stop => "stop",
            ServerAction::Reboot => "reboot",
            ServerAction::Destroy => "destroy",
        }
    }

    /// Whether the user must confirm before the action runs.
    pub fn needs_confirmation(&self) -> bool {
        !matches!(self, ServerAction::Start)
    }

    /// Activity identifier emitted after a successful run.
    pub fn activity_id(&self) -> &'static str {
        match self {
            ServerAction::Start => "activity.virtualserver.start",
            ServerAction::Stop => "activity.virtualserver.stop",
            ServerAction::Reboot => "activity.virtualserver.reboot",
            ServerAction::Destroy => "activity.virtualserver.destroy",
        }
    }
}

impl fmt::Display for ServerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Server not found: {0}")]
    NotFound(String),

    #[error("{count} servers are named {name}")]
    Ambiguous { name: String, count: usize },

    #[error(transparent)]
    Provider(#[from] ComputeError),
}

/// Find the one server called `name` in a snapshot.
pub fn resolve_name<'a>(
    servers: &'a [Server],
    name: &str,
) -> std::result::Result<&'a Server, ActionError> {
    let mut matches = servers.iter().filter(|s| s.name == name);
    let first = matches
        .next()
        .ok_or_else(|| ActionError::NotFound(name.to_string()))?;

    let others = matches.count();
    if others > 0 {
        return Err(ActionError::Ambiguous {
            name: name.to_string(),
            count: others + 1,
        });
    }
    Ok(first)
}

/// Run `action` against the server called `name`.
///
/// A 404 from the mutating call is reported as [`ActionError::NotFound`],
/// same as a name missing from the snapshot.
pub async fn act_by_name(
    client: &dyn ComputeClient,
    action: ServerAction,
    name: &str,
) -> std::result::Result<Server, ActionError> {
    let servers = client.list_servers().await?;
    let server = resolve_name(&servers, name)?.clone();

    tracing::debug!(%action, name, id = %server.id, "Resolved server");

    let result = match action {
        ServerAction::Start => client.start_server(&server).await,
        ServerAction::Stop => client.stop_server(&server).await,
        ServerAction::Reboot => client.reboot_server(&server).await,
        ServerAction::Destroy => client.destroy_server(&server).await,
    };

    match result {
        Ok(()) => Ok(server),
        Err(e) if e.is_not_found() => Err(ActionError::NotFound(name.to_string())),
        Err(e) => Err(ActionError::Provider(e)),
    }
}
