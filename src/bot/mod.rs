//! Chat-surface independent bot logic.
//!
//! This module turns chat text and NLP events into server actions:
//! - Command routing (`intent`)
//! - The confirmation gate for destructive actions (`confirm`)
//! - Result formatting and localized messages (`format`, `catalog`)
//! - Known-name publishing for entity recognition (`entities`)

pub mod activity;
pub mod catalog;
pub mod confirm;
pub mod dispatcher;
pub mod entities;
pub mod format;
pub mod intent;

#[cfg(test)]
pub mod testing;

pub use catalog::Catalog;
pub use confirm::{ConfirmationStore, ConversationKey, PendingConfirmation};
pub use dispatcher::{Dispatch, Dispatcher, OutputSink};
pub use format::Output;
pub use intent::{Intent, IntentEvent, Verb};
