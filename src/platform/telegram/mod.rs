//! Telegram Bot API implementation of [`ChatPlatform`](super::ChatPlatform).

mod api;
mod client;
mod config;
/// Long-polling of membership updates.
pub mod updates;

pub use client::TelegramClient;
pub use config::{TelegramConfig, TelegramConfigError};
pub use updates::UpdatePoller;
