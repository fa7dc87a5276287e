//! Fan-out of one payload to a snapshot of subscribers.
//!
//! Every recipient gets its own task, started immediately. A failed delivery
//! is recorded in that recipient's [`DeliveryOutcome`] and logged; it never
//! reaches the sender and never affects the other recipients.

use std::{num::NonZeroUsize, sync::Arc};

use {
    tokio::{sync::Semaphore, task::JoinHandle},
    tracing::{debug, warn},
};

use lectern_channels::{ChannelOutbound, Payload, SubscriberId};

use crate::notices;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub recipient: SubscriberId,
    pub status: DeliveryStatus,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }
}

/// In-flight broadcast. Dropping it detaches the delivery tasks.
#[derive(Debug)]
pub struct BroadcastHandle {
    recipients: Vec<SubscriberId>,
    tasks: Vec<JoinHandle<DeliveryOutcome>>,
}

impl BroadcastHandle {
    /// Number of recipients a delivery was attempted for.
    pub fn attempted(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every delivery to finish.
    pub async fn join(self) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        for (recipient, task) in self.recipients.into_iter().zip(self.tasks) {
            let outcome = task.await.unwrap_or_else(|e| DeliveryOutcome {
                recipient,
                status: DeliveryStatus::Failed {
                    error: e.to_string(),
                },
            });
            outcomes.push(outcome);
        }
        outcomes
    }
}

pub struct Broadcaster {
    outbound: Arc<dyn ChannelOutbound>,
    max_in_flight: Option<NonZeroUsize>,
}

impl Broadcaster {
    pub fn new(outbound: Arc<dyn ChannelOutbound>) -> Self {
        Self {
            outbound,
            max_in_flight: None,
        }
    }

    /// Cap concurrent deliveries per broadcast.
    #[must_use]
    pub fn with_max_in_flight(mut self, limit: Option<NonZeroUsize>) -> Self {
        self.max_in_flight = limit;
        self
    }

    /// Start delivering `payload` to every recipient. Must be called from
    /// within a tokio runtime.
    pub fn broadcast(&self, payload: &Payload, recipients: Vec<SubscriberId>) -> BroadcastHandle {
        let payload = Arc::new(as_delivered(payload));
        let limiter = self
            .max_in_flight
            .map(|limit| Arc::new(Semaphore::new(limit.get())));

        debug!(
            kind = payload.kind(),
            recipients = recipients.len(),
            "starting broadcast"
        );

        let tasks = recipients
            .iter()
            .map(|recipient| {
                let outbound = Arc::clone(&self.outbound);
                let payload = Arc::clone(&payload);
                let limiter = limiter.clone();
                let recipient = recipient.clone();
                tokio::spawn(async move {
                    let _permit = match limiter {
                        Some(sem) => sem.acquire_owned().await.ok(),
                        None => None,
                    };
                    deliver(outbound.as_ref(), recipient, &payload).await
                })
            })
            .collect();

        BroadcastHandle { recipients, tasks }
    }
}

async fn deliver(
    outbound: &dyn ChannelOutbound,
    recipient: SubscriberId,
    payload: &Payload,
) -> DeliveryOutcome {
    let status = match outbound.send_payload(&recipient, payload).await {
        Ok(()) => DeliveryStatus::Delivered,
        Err(e) => {
            warn!(
                chat_id = %recipient,
                kind = payload.kind(),
                error = %e,
                "broadcast delivery failed"
            );
            DeliveryStatus::Failed {
                error: e.to_string(),
            }
        },
    };
    DeliveryOutcome { recipient, status }
}

/// Text broadcasts are framed as an assignment; media go out unchanged.
fn as_delivered(payload: &Payload) -> Payload {
    match payload {
        Payload::Text { text } => Payload::text(notices::assignment(text)),
        other => other.clone(),
    }
}
