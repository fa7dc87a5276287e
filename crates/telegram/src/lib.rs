//! Telegram transport for the relay.
//!
//! Long-polls the Bot API with teloxide, turns each message into an
//! [`lectern_channels::InboundEvent`] for the session controller, and sends
//! replies and broadcasts through [`TelegramOutbound`].

pub mod bot;
pub mod config;
pub mod error;
pub mod handlers;
pub mod outbound;

pub use {
    bot::{BOT_COMMANDS, TelegramBot, connect},
    config::TelegramConfig,
    error::{Error, Result},
    outbound::TelegramOutbound,
};
