use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque recipient key (a platform chat id rendered as a string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for SubscriberId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for SubscriberId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Who sent an inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Chat the event came from; replies and subscriptions are keyed by it.
    pub chat: SubscriberId,
    /// Platform username, without the leading `@`.
    pub username: Option<String>,
}

impl Sender {
    pub fn new(chat: impl Into<SubscriberId>, username: Option<String>) -> Self {
        Self {
            chat: chat.into(),
            username,
        }
    }
}

/// Broadcastable content. Exactly one media kind per payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Text {
        text: String,
    },
    Photo {
        file_id: String,
        caption: Option<String>,
    },
    Document {
        file_id: String,
        caption: Option<String>,
    },
    Video {
        file_id: String,
        caption: Option<String>,
    },
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Photo { .. } => "photo",
            Self::Document { .. } => "document",
            Self::Video { .. } => "video",
        }
    }
}

/// Content of an inbound message, decoded once at ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    /// Plain text; may turn out to be a command.
    Text { text: String },
    /// One of the relayable media kinds.
    Media { payload: Payload },
    /// Anything the relay does not know how to re-deliver (stickers, polls, ...).
    Unsupported,
}

/// A single inbound event from the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub sender: Sender,
    pub body: MessageBody,
}

impl InboundEvent {
    pub fn text(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            body: MessageBody::Text { text: text.into() },
        }
    }

    pub fn media(sender: Sender, payload: Payload) -> Self {
        Self {
            sender,
            body: MessageBody::Media { payload },
        }
    }
}
