//! Command vs. payload classification.
//!
//! Runs before any role-based routing: a text starting with `/` is always a
//! command (known or not) and can never reach the broadcaster.

use crate::types::{MessageBody, Payload};

/// Prefix that marks a text message as a command.
pub const COMMAND_PREFIX: char = '/';

/// Recognized command tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Exit,
    Count,
}

impl Command {
    /// All commands, in the order they are advertised to the platform.
    pub const ALL: [Command; 3] = [Command::Start, Command::Exit, Command::Count];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Exit => "exit",
            Self::Count => "count",
        }
    }

    /// Parse a bare token (no prefix). Case-insensitive.
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.as_str().eq_ignore_ascii_case(token))
    }
}

/// Result of classifying an inbound body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Command(Command),
    Payload(Payload),
    /// Unknown command or unsupported content; dropped.
    Unroutable,
}

/// Decide what an inbound body is.
///
/// `bot_username` is this bot's own username. When it is known, a command
/// addressed to a different bot (`/start@other_bot`) is unroutable.
pub fn classify(body: &MessageBody, bot_username: Option<&str>) -> Classification {
    match body {
        MessageBody::Text { text } => match text.strip_prefix(COMMAND_PREFIX) {
            Some(rest) => command_token(rest, bot_username)
                .and_then(Command::parse)
                .map_or(Classification::Unroutable, Classification::Command),
            None => Classification::Payload(Payload::Text { text: text.clone() }),
        },
        MessageBody::Media { payload } => Classification::Payload(payload.clone()),
        MessageBody::Unsupported => Classification::Unroutable,
    }
}

/// Extract the command token from `start@my_bot arg` style text.
fn command_token<'a>(rest: &'a str, bot_username: Option<&str>) -> Option<&'a str> {
    let word = rest.split(char::is_whitespace).next()?;
    let token = match word.split_once('@') {
        Some((token, mention)) => {
            let own = bot_username.map(|name| name.trim_start_matches('@'));
            if own.is_some_and(|own| !own.eq_ignore_ascii_case(mention)) {
                return None;
            }
            token
        },
        None => word,
    };
    (!token.is_empty()).then_some(token)
}
