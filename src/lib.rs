//! vsbot library root.

pub mod bot;
pub mod cli;
pub mod compute;
pub mod config;
pub mod error;
pub mod logging;
pub mod telegram;

pub use bot::{Dispatcher, Intent};
pub use compute::{ComputeClient, Server, ServerAction};
pub use config::Settings;
pub use error::{Error, Result};
