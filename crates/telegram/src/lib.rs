//! Telegram Bot API client.
//!
//! Covers the handful of methods the relay needs: long polling, text
//! messages with inline keyboards, edits, deletes, callback answers and
//! streamed document uploads. [`BotClient`] also implements
//! `DeliveryTransport`, so the pipeline can deliver through it directly.

pub mod client;
pub mod endpoint;
mod transport;
pub mod types;

pub use client::{BotClient, Error};
pub use endpoint::{ApiEndpointConfig, ConfigError};
pub use types::{
    CallbackQuery, Chat, InlineKeyboardButton, InlineKeyboardMarkup, Message, Update, User,
};
