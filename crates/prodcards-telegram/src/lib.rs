//! Telegram front end for product card generation
//!
//! - [`api`]: minimal Bot API client behind the [`BotApi`] trait
//! - [`commands`]: classification of inbound text
//! - [`format`]: reply texts
//! - [`handlers`]: reply logic per intent
//! - [`runner`]: long-polling loop

pub mod api;
pub mod commands;
pub mod format;
pub mod handlers;
pub mod runner;

pub use api::{BotApi, TelegramClient, TelegramError, TelegramResult};
pub use commands::{Intent, classify};
pub use handlers::{BotHandlers, BotSettings};
pub use runner::BotRunner;
