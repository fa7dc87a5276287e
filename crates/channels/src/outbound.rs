use async_trait::async_trait;

use crate::{
    Result,
    types::{Payload, SubscriberId},
};

/// Send messages to a channel.
///
/// One primitive per relayable media kind, keyed by recipient. Media are
/// re-sent by platform file reference, never re-uploaded.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    async fn send_text(&self, to: &SubscriberId, text: &str) -> Result<()>;
    async fn send_photo(&self, to: &SubscriberId, file_id: &str, caption: Option<&str>)
    -> Result<()>;
    async fn send_document(
        &self,
        to: &SubscriberId,
        file_id: &str,
        caption: Option<&str>,
    ) -> Result<()>;
    async fn send_video(&self, to: &SubscriberId, file_id: &str, caption: Option<&str>)
    -> Result<()>;

    /// Dispatch a payload to the matching primitive.
    async fn send_payload(&self, to: &SubscriberId, payload: &Payload) -> Result<()> {
        match payload {
            Payload::Text { text } => self.send_text(to, text).await,
            Payload::Photo { file_id, caption } => {
                self.send_photo(to, file_id, caption.as_deref()).await
            },
            Payload::Document { file_id, caption } => {
                self.send_document(to, file_id, caption.as_deref()).await
            },
            Payload::Video { file_id, caption } => {
                self.send_video(to, file_id, caption.as_deref()).await
            },
        }
    }
}
