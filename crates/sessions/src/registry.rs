//! The subscriber set and its expiry timers.
//!
//! All mutations go through [`SessionRegistry`] and are serialized by one
//! mutex, which is never held across an `.await`. Each entry carries a
//! generation number: a timer can only remove the subscription it was
//! scheduled for, never a later re-subscription of the same id.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, Weak},
    time::Duration,
};

use tracing::{debug, info};

use lectern_channels::SubscriberId;

use crate::clock::{Clock, TimerHandle};

/// How long a subscription lives unless the subscriber leaves first.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Added,
    /// Already subscribed; the existing expiry timer is left untouched.
    AlreadyActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Removed,
    NotFound,
}

/// A registry operation listeners are told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Subscribed(SubscriberId),
    /// `subscribe` on an id that is already present. Nothing changed, but the
    /// current count is re-announced.
    AlreadySubscribed(SubscriberId),
    /// Explicit removal by the subscriber.
    Unsubscribed(SubscriberId),
    /// Removal by the expiry timer.
    Expired(SubscriberId),
}

/// Receives every registry operation together with the resulting count.
///
/// Called synchronously with the registry lock held, so events arrive in
/// mutation order. Implementations must not block and must not call back into
/// the registry.
pub trait SessionListener: Send + Sync {
    fn on_session_event(&self, event: &SessionEvent, count: usize);
}

struct Entry {
    generation: u64,
    timer: TimerHandle,
}

#[derive(Default)]
struct Entries {
    by_id: HashMap<SubscriberId, Entry>,
    next_generation: u64,
}

struct Inner {
    entries: Mutex<Entries>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    listener: Option<Arc<dyn SessionListener>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let entries = self.entries.get_mut().unwrap_or_else(|e| e.into_inner());
        for entry in entries.by_id.values() {
            entry.timer.cancel();
        }
    }
}

/// Registry of active subscribers. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

impl SessionRegistry {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self::build(clock, ttl, None)
    }

    pub fn with_listener(
        clock: Arc<dyn Clock>,
        ttl: Duration,
        listener: Arc<dyn SessionListener>,
    ) -> Self {
        Self::build(clock, ttl, Some(listener))
    }

    fn build(
        clock: Arc<dyn Clock>,
        ttl: Duration,
        listener: Option<Arc<dyn SessionListener>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(Entries::default()),
                clock,
                ttl,
                listener,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Add `id` with a fresh expiry timer. A no-op if `id` is already present.
    pub fn subscribe(&self, id: SubscriberId) -> SubscribeOutcome {
        let mut entries = self.lock();
        if entries.by_id.contains_key(&id) {
            debug!(chat_id = %id, "already subscribed, keeping existing timer");
            let count = entries.by_id.len();
            self.emit(&SessionEvent::AlreadySubscribed(id), count);
            return SubscribeOutcome::AlreadyActive;
        }

        let generation = entries.next_generation;
        entries.next_generation += 1;

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let timer_id = id.clone();
        let timer = self.inner.clock.schedule(
            self.inner.ttl,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    SessionRegistry { inner }.expire_now(&timer_id, generation);
                }
            }),
        );

        entries.by_id.insert(id.clone(), Entry { generation, timer });
        let count = entries.by_id.len();
        info!(chat_id = %id, count, "subscriber added");
        self.emit(&SessionEvent::Subscribed(id), count);
        SubscribeOutcome::Added
    }

    /// Cancel `id`'s timer and remove it.
    pub fn unsubscribe(&self, id: &SubscriberId) -> UnsubscribeOutcome {
        let mut entries = self.lock();
        let Some(entry) = entries.by_id.remove(id) else {
            return UnsubscribeOutcome::NotFound;
        };
        entry.timer.cancel();
        let count = entries.by_id.len();
        info!(chat_id = %id, count, "subscriber left");
        self.emit(&SessionEvent::Unsubscribed(id.clone()), count);
        UnsubscribeOutcome::Removed
    }

    /// Timer path: remove `id` only if it is still the subscription with
    /// this `generation`.
    pub(crate) fn expire_now(&self, id: &SubscriberId, generation: u64) -> bool {
        let mut entries = self.lock();
        match entries.by_id.get(id) {
            None => return false,
            Some(entry) if entry.generation != generation => {
                debug!(chat_id = %id, "stale expiry timer ignored");
                return false;
            },
            Some(_) => {},
        }
        if let Some(entry) = entries.by_id.remove(id) {
            entry.timer.cancel();
        }
        let count = entries.by_id.len();
        info!(chat_id = %id, count, "subscription expired");
        self.emit(&SessionEvent::Expired(id.clone()), count);
        true
    }

    pub fn count(&self) -> usize {
        self.lock().by_id.len()
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.lock().by_id.contains_key(id)
    }

    /// Copy of the current subscriber ids, in no particular order.
    pub fn snapshot(&self) -> Vec<SubscriberId> {
        self.lock().by_id.keys().cloned().collect()
    }

    fn emit(&self, event: &SessionEvent, count: usize) {
        if let Some(listener) = &self.inner.listener {
            listener.on_session_event(event, count);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.inner.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("ttl", &self.inner.ttl)
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::clock::ManualClock};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(SessionEvent, usize)>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<(SessionEvent, usize)> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    impl SessionListener for Recorder {
        fn on_session_event(&self, event: &SessionEvent, count: usize) {
            self.events.lock().unwrap().push((event.clone(), count));
        }
    }

    fn setup() -> (SessionRegistry, ManualClock, Arc<Recorder>) {
        let clock = ManualClock::new();
        let recorder = Arc::new(Recorder::default());
        let registry = SessionRegistry::with_listener(
            Arc::new(clock.clone()),
            DEFAULT_SESSION_TTL,
            Arc::clone(&recorder) as Arc<dyn SessionListener>,
        );
        (registry, clock, recorder)
    }

    fn id(s: &str) -> SubscriberId {
        SubscriberId::from(s)
    }

    #[test]
    fn subscribe_and_count() {
        let (registry, clock, recorder) = setup();
        assert_eq!(registry.subscribe(id("a")), SubscribeOutcome::Added);
        assert_eq!(registry.subscribe(id("b")), SubscribeOutcome::Added);
        assert_eq!(registry.count(), 2);
        assert_eq!(clock.pending(), 2);
        assert_eq!(recorder.take(), vec![
            (SessionEvent::Subscribed(id("a")), 1),
            (SessionEvent::Subscribed(id("b")), 2),
        ]);

        let mut snapshot = registry.snapshot();
        snapshot.sort();
        assert_eq!(snapshot, vec![id("a"), id("b")]);
    }

    #[test]
    fn duplicate_subscribe_keeps_single_timer() {
        let (registry, clock, recorder) = setup();
        registry.subscribe(id("a"));
        clock.advance(Duration::from_secs(20 * 60));

        assert_eq!(registry.subscribe(id("a")), SubscribeOutcome::AlreadyActive);
        assert_eq!(clock.pending(), 1);
        assert_eq!(registry.count(), 1);

        // The original timer is not reset: expiry still happens at T+30min.
        clock.advance(Duration::from_secs(10 * 60));
        assert!(!registry.contains(&id("a")));
        assert_eq!(recorder.take(), vec![
            (SessionEvent::Subscribed(id("a")), 1),
            (SessionEvent::AlreadySubscribed(id("a")), 1),
            (SessionEvent::Expired(id("a")), 0),
        ]);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let (registry, clock, recorder) = setup();
        registry.subscribe(id("a"));
        recorder.take();

        assert_eq!(registry.unsubscribe(&id("a")), UnsubscribeOutcome::Removed);
        assert_eq!(registry.unsubscribe(&id("a")), UnsubscribeOutcome::NotFound);
        assert_eq!(registry.count(), 0);
        assert_eq!(clock.pending(), 0);
        assert_eq!(recorder.take(), vec![(SessionEvent::Unsubscribed(id("a")), 0)]);
    }

    #[test]
    fn expires_after_ttl() {
        let (registry, clock, recorder) = setup();
        registry.subscribe(id("a"));
        recorder.take();

        clock.advance(DEFAULT_SESSION_TTL - Duration::from_secs(1));
        assert!(registry.contains(&id("a")));

        clock.advance(Duration::from_secs(1));
        assert!(!registry.contains(&id("a")));
        assert_eq!(recorder.take(), vec![(SessionEvent::Expired(id("a")), 0)]);
    }

    #[test]
    fn explicit_exit_prevents_expiry() {
        let (registry, clock, recorder) = setup();
        registry.subscribe(id("a"));
        registry.unsubscribe(&id("a"));
        recorder.take();

        assert_eq!(clock.advance(DEFAULT_SESSION_TTL * 2), 0);
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn stale_timer_does_not_remove_resubscription() {
        let (registry, clock, recorder) = setup();
        registry.subscribe(id("a"));
        let first_timer_id = id("a");
        clock.advance(Duration::from_secs(60));

        // Leave and rejoin: the second subscription gets its own timer.
        registry.unsubscribe(&first_timer_id);
        registry.subscribe(id("a"));
        recorder.take();

        // Run the first subscription's would-be deadline; nothing happens.
        clock.advance(DEFAULT_SESSION_TTL - Duration::from_secs(60));
        assert!(registry.contains(&id("a")));

        clock.advance(Duration::from_secs(60));
        assert!(!registry.contains(&id("a")));
        assert_eq!(recorder.take(), vec![(SessionEvent::Expired(id("a")), 0)]);
    }

    #[test]
    fn stale_generation_is_ignored() {
        let (registry, _clock, recorder) = setup();
        registry.subscribe(id("a"));
        registry.unsubscribe(&id("a"));
        registry.subscribe(id("a"));
        recorder.take();

        // Generation 0 belonged to the first subscription.
        assert!(!registry.expire_now(&id("a"), 0));
        assert!(registry.contains(&id("a")));
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn expire_now_then_unsubscribe() {
        let (registry, clock, recorder) = setup();
        registry.subscribe(id("a"));
        recorder.take();

        assert!(registry.expire_now(&id("a"), 0));
        assert!(!registry.expire_now(&id("a"), 0));
        assert_eq!(registry.unsubscribe(&id("a")), UnsubscribeOutcome::NotFound);
        assert_eq!(clock.pending(), 0);
        assert_eq!(recorder.take(), vec![(SessionEvent::Expired(id("a")), 0)]);
    }

    #[test]
    fn count_tracks_interleaved_operations() {
        let (registry, clock, _recorder) = setup();
        let ids: Vec<_> = (0..10).map(|i| id(&i.to_string())).collect();
        for sub in &ids {
            registry.subscribe(sub.clone());
        }
        for sub in ids.iter().step_by(2) {
            registry.unsubscribe(sub);
        }
        assert_eq!(registry.count(), 5);
        assert_eq!(clock.pending(), 5);

        clock.advance(DEFAULT_SESSION_TTL);
        assert_eq!(registry.count(), 0);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn dropping_registry_cancels_timers() {
        let clock = ManualClock::new();
        let registry = SessionRegistry::new(Arc::new(clock.clone()), DEFAULT_SESSION_TTL);
        registry.subscribe(id("a"));
        assert_eq!(clock.pending(), 1);
        drop(registry);
        assert_eq!(clock.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_expires_subscription() {
        let clock = crate::clock::TokioClock::current().unwrap();
        let registry = SessionRegistry::new(Arc::new(clock), Duration::from_secs(30));
        registry.subscribe(id("a"));
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(registry.contains(&id("a")));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!registry.contains(&id("a")));
    }
}
