//! Telegram bot integration.

pub mod client;
pub mod handler;

pub use client::run_telegram_daemon;
