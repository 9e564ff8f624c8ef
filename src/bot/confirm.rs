//! Confirmation gate for destructive actions.
//!
//! Confirmation is two-phase: [`propose`] builds a [`PendingConfirmation`]
//! and [`resolve`] turns the user's reply into a [`Resolution`]. Between the
//! two, the pending state lives in a [`ConfirmationStore`] owned by whoever
//! holds the conversation, never by the action itself.

use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::catalog::Catalog;
use crate::compute::ServerAction;

/// A proposed action waiting for a yes/no reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfirmation {
    pub id: String,
    pub action: ServerAction,
    pub name: String,
    /// Question sent to the user.
    pub prompt: String,
    /// Final message when the user declines.
    pub negative: String,
    pub created_at: i64,
}

/// Outcome of a confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Proceed { action: ServerAction, name: String },
    Declined { message: String },
}

/// Build the confirmation for `action` on `name`.
pub fn propose(action: ServerAction, name: &str, catalog: &Catalog) -> PendingConfirmation {
    PendingConfirmation {
        id: ulid::Ulid::new().to_string(),
        action,
        name: name.to_string(),
        prompt: catalog.t(&format!("vs.{}.confirm", action), &[name]),
        negative: catalog.t("general.safe.this.time", &[name]),
        created_at: Utc::now().timestamp_millis(),
    }
}

/// Resolve a pending confirmation with the user's answer.
pub fn resolve(pending: PendingConfirmation, affirmative: bool) -> Resolution {
    if affirmative {
        Resolution::Proceed {
            action: pending.action,
            name: pending.name,
        }
    } else {
        Resolution::Declined {
            message: pending.negative,
        }
    }
}

/// Whether a chat reply counts as "yes". Everything else is "no".
pub fn is_affirmative(reply: &str) -> bool {
    let reply = reply
        .trim()
        .trim_end_matches(['.', '!'])
        .to_lowercase();
    matches!(
        reply.as_str(),
        "yes" | "y" | "yeah" | "yep" | "sure" | "ok" | "okay"
    )
}

/// Who a confirmation belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub chat: String,
    pub user: String,
}

impl ConversationKey {
    pub fn new(chat: impl ToString, user: impl ToString) -> Self {
        Self {
            chat: chat.to_string(),
            user: user.to_string(),
        }
    }
}

/// Pending confirmations, one per chat and user.
#[derive(Default)]
pub struct ConfirmationStore {
    pending: Mutex<HashMap<ConversationKey, PendingConfirmation>>,
}

impl ConfirmationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a confirmation. A newer proposal replaces an older one.
    pub async fn insert(&self, key: ConversationKey, pending: PendingConfirmation) {
        if let Some(old) = self.pending.lock().await.insert(key, pending) {
            tracing::debug!(id = %old.id, "Replaced unanswered confirmation");
        }
    }

    /// Take the confirmation waiting on `key`, if any.
    pub async fn take(&self, key: &ConversationKey) -> Option<PendingConfirmation> {
        self.pending.lock().await.remove(key)
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop confirmations older than `max_age_ms`. They never complete.
    pub async fn cleanup(&self, max_age_ms: i64) -> usize {
        let now = Utc::now().timestamp_millis();
        let mut removed = 0;

        self.pending.lock().await.retain(|_key, pending| {
            let expired = (now - pending.created_at) > max_age_ms;
            if expired {
                removed += 1;
            }
            !expired
        });

        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_propose_builds_prompts() {
        let pending = propose(ServerAction::Destroy, "web", &Catalog::keys_only());
        assert_eq!(pending.prompt, "vs.destroy.confirm:web");
        assert_eq!(pending.negative, "general.safe.this.time:web");
        assert_eq!(pending.action, ServerAction::Destroy);
    }

    #[test]
    fn test_resolve() {
        let pending = propose(ServerAction::Stop, "web", &Catalog::keys_only());
        assert_eq!(
            resolve(pending.clone(), true),
            Resolution::Proceed {
                action: ServerAction::Stop,
                name: "web".into()
            }
        );
        assert_eq!(
            resolve(pending, false),
            Resolution::Declined {
                message: "general.safe.this.time:web".into()
            }
        );
    }

    #[test]
    fn test_is_affirmative() {
        for yes in ["yes", "Yes", " y ", "OK!", "sure.", "yeah"] {
            assert!(is_affirmative(yes), "{}", yes);
        }
        for no in ["no", "n", "nope", "", "yes please no", "maybe"] {
            assert!(!is_affirmative(no), "{}", no);
        }
    }

    #[tokio::test]
    async fn test_store_is_keyed_per_user() {
        let store = ConfirmationStore::new();
        let catalog = Catalog::keys_only();
        let alice = ConversationKey::new(1, "alice");
        let bob = ConversationKey::new(1, "bob");

        store
            .insert(alice.clone(), propose(ServerAction::Stop, "web", &catalog))
            .await;
        assert!(store.take(&bob).await.is_none());

        store
            .insert(alice.clone(), propose(ServerAction::Reboot, "db", &catalog))
            .await;
        assert_eq!(store.len().await, 1);

        let pending = store.take(&alice).await.unwrap();
        assert_eq!(pending.name, "db");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_cleanup() {
        let store = ConfirmationStore::new();
        let mut old = propose(ServerAction::Stop, "web", &Catalog::keys_only());
        old.created_at -= 120_000;
        store.insert(ConversationKey::new(1, "alice"), old).await;
        store
            .insert(
                ConversationKey::new(2, "bob"),
                propose(ServerAction::Stop, "db", &Catalog::keys_only()),
            )
            .await;

        assert_eq!(store.cleanup(60_000).await, 1);
        assert_eq!(store.len().await, 1);
    }
}
