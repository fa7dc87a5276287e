use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    lectern_channels::{ChannelOutbound, Error as ChannelError, Payload, SubscriberId},
};

use crate::notifier::ObserverNotifier;

#[derive(Default)]
pub(crate) struct MockOutbound {
    pub sent: Mutex<Vec<(SubscriberId, Payload)>>,
    pub failing: Mutex<HashSet<SubscriberId>>,
    pub delay: Option<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockOutbound {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Default::default()
        })
    }

    pub fn fail_for(&self, id: &str) {
        self.failing.lock().unwrap().insert(SubscriberId::from(id));
    }

    pub fn sent(&self) -> Vec<(SubscriberId, Payload)> {
        let mut sent = self.sent.lock().unwrap().clone();
        sent.sort_by(|a, b| a.0.cmp(&b.0));
        sent
    }

    /// Texts sent to `to`, in send order.
    pub fn texts_to(&self, to: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id.as_str() == to)
            .filter_map(|(_, p)| match p {
                Payload::Text { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, to: &SubscriberId, payload: Payload) -> lectern_channels::Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(to) {
            return Err(ChannelError::unavailable("bot was blocked by the user"));
        }
        self.sent.lock().unwrap().push((to.clone(), payload));
        Ok(())
    }
}

#[async_trait]
impl ChannelOutbound for MockOutbound {
    async fn send_text(&self, to: &SubscriberId, text: &str) -> lectern_channels::Result<()> {
        self.record(to, Payload::text(text)).await
    }

    async fn send_photo(
        &self,
        to: &SubscriberId,
        file_id: &str,
        caption: Option<&str>,
    ) -> lectern_channels::Result<()> {
        self.record(to, Payload::Photo {
            file_id: file_id.into(),
            caption: caption.map(Into::into),
        })
        .await
    }

    async fn send_document(
        &self,
        to: &SubscriberId,
        file_id: &str,
        caption: Option<&str>,
    ) -> lectern_channels::Result<()> {
        self.record(to, Payload::Document {
            file_id: file_id.into(),
            caption: caption.map(Into::into),
        })
        .await
    }

    async fn send_video(
        &self,
        to: &SubscriberId,
        file_id: &str,
        caption: Option<&str>,
    ) -> lectern_channels::Result<()> {
        self.record(to, Payload::Video {
            file_id: file_id.into(),
            caption: caption.map(Into::into),
        })
        .await
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub counts: Mutex<Vec<usize>>,
}

impl RecordingNotifier {
    pub fn counts(&self) -> Vec<usize> {
        self.counts.lock().unwrap().clone()
    }
}

impl ObserverNotifier for RecordingNotifier {
    fn notify_all(&self, count: usize) {
        self.counts.lock().unwrap().push(count);
    }
}
