//! Connected observers and the count they are shown.
//!
//! The hub keeps the last count it pushed. A new observer is seeded with that
//! value under the same lock that `notify_all` takes, so an observer can never
//! receive an older count after a newer one.

use std::{collections::HashMap, sync::RwLock, time::Instant};

use {
    serde::{Deserialize, Serialize},
    tokio::sync::mpsc,
    tracing::{debug, warn},
};

use lectern_relay::ObserverNotifier;

/// Frame pushed to every observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountFrame {
    pub count: usize,
}

impl CountFrame {
    pub fn encode(self) -> Option<String> {
        match serde_json::to_string(&self) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(error = %e, "failed to encode count frame");
                None
            },
        }
    }
}

/// One connected observer.
#[derive(Debug)]
pub struct Observer {
    pub conn_id: String,
    /// Serialized frames for this observer's write loop.
    pub sender: mpsc::UnboundedSender<String>,
    pub connected_at: Instant,
}

impl Observer {
    /// Queue a frame. Returns `false` if the write loop has gone away.
    pub fn send(&self, frame: &str) -> bool {
        self.sender.send(frame.to_string()).is_ok()
    }
}

#[derive(Debug, Default)]
struct HubState {
    observers: HashMap<String, Observer>,
    last_count: usize,
}

#[derive(Debug, Default)]
pub struct ObserverHub {
    inner: RwLock<HubState>,
}

impl ObserverHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer and queue the current count for it.
    pub fn connect(&self, conn_id: impl Into<String>, sender: mpsc::UnboundedSender<String>) {
        let observer = Observer {
            conn_id: conn_id.into(),
            sender,
            connected_at: Instant::now(),
        };
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let seed = CountFrame {
            count: inner.last_count,
        };
        if let Some(frame) = seed.encode() {
            if !observer.send(&frame) {
                debug!(conn_id = %observer.conn_id, "observer closed before seed");
                return;
            }
        }
        inner.observers.insert(observer.conn_id.clone(), observer);
    }

    pub fn disconnect(&self, conn_id: &str) -> Option<Observer> {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .observers
            .remove(conn_id)
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .observers
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count most recently pushed to observers.
    pub fn last_count(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).last_count
    }
}

impl ObserverNotifier for ObserverHub {
    fn notify_all(&self, count: usize) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.last_count = count;
        let Some(frame) = (CountFrame { count }).encode() else {
            return;
        };
        // Closed observers are skipped and dropped; the others still get the frame.
        inner.observers.retain(|conn_id, observer| {
            let open = observer.send(&frame);
            if !open {
                debug!(conn_id = %conn_id, "dropping closed observer");
            }
            open
        });
    }
}
