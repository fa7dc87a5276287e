use {
    teloxide::types::{MediaKind, Message, MessageKind, PhotoSize},
    tracing::{debug, info},
};

use {
    lectern_channels::{InboundEvent, MessageBody, Payload, Sender, SubscriberId},
    lectern_relay::{Handled, SessionController},
};

use crate::error::Result;

/// Convert a Telegram message into the relay's inbound event.
///
/// The chat id identifies the subscriber; the username comes from the
/// message author, if Telegram provided one.
pub fn inbound_event(msg: &Message) -> InboundEvent {
    let username = msg.from.as_ref().and_then(|u| u.username.clone());
    let sender = Sender::new(SubscriberId::from(msg.chat.id.0), username);
    InboundEvent {
        sender,
        body: message_body(msg),
    }
}

fn message_body(msg: &Message) -> MessageBody {
    let MessageKind::Common(common) = &msg.kind else {
        return MessageBody::Unsupported;
    };
    match &common.media_kind {
        MediaKind::Text(t) => MessageBody::Text {
            text: t.text.clone(),
        },
        MediaKind::Photo(p) => match largest_photo(&p.photo) {
            Some(size) => MessageBody::Media {
                payload: Payload::Photo {
                    file_id: size.file.id.to_string(),
                    caption: p.caption.clone(),
                },
            },
            None => MessageBody::Unsupported,
        },
        MediaKind::Document(d) => MessageBody::Media {
            payload: Payload::Document {
                file_id: d.document.file.id.to_string(),
                caption: d.caption.clone(),
            },
        },
        MediaKind::Video(v) => MessageBody::Media {
            payload: Payload::Video {
                file_id: v.video.file.id.to_string(),
                caption: v.caption.clone(),
            },
        },
        _ => MessageBody::Unsupported,
    }
}

/// Telegram lists sizes smallest first, but pick by area rather than rely on it.
fn largest_photo(sizes: &[PhotoSize]) -> Option<&PhotoSize> {
    sizes
        .iter()
        .max_by_key(|s| u64::from(s.width) * u64::from(s.height))
}

/// Route one incoming message through the session controller.
pub async fn handle_message(msg: &Message, controller: &SessionController) -> Result<()> {
    let event = inbound_event(msg);
    let chat_id = event.sender.chat.clone();

    match controller.handle(&event).await? {
        Handled::Broadcast(handle) => {
            info!(
                chat_id = %chat_id,
                recipients = handle.attempted(),
                "instructor broadcast started"
            );
        },
        Handled::Ignored => {
            debug!(chat_id = %chat_id, "message ignored");
        },
        other => {
            debug!(chat_id = %chat_id, outcome = ?other, "message handled");
        },
    }
    Ok(())
}
