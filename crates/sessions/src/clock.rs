//! One-shot, cancellable timers.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use {tokio::runtime::Handle, tokio_util::sync::CancellationToken, tracing::trace};

use crate::Result;

/// Work to run when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Schedules callbacks after a delay.
pub trait Clock: Send + Sync {
    /// Run `callback` once after `after`, unless the returned handle is
    /// cancelled first.
    fn schedule(&self, after: Duration, callback: TimerCallback) -> TimerHandle;
}

/// Cancellation handle for a scheduled timer.
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
    cancel: CancellationToken,
}

impl TimerHandle {
    fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Prevent the callback from running. Idempotent; a no-op after firing.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

// ── Tokio ────────────────────────────────────────────────────────────────────

/// Clock backed by `tokio::time::sleep`; each timer is its own task.
#[derive(Debug, Clone)]
pub struct TokioClock {
    handle: Handle,
}

impl TokioClock {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Bind to the runtime of the calling context.
    pub fn current() -> Result<Self> {
        Ok(Self::new(Handle::try_current()?))
    }
}

impl Clock for TokioClock {
    fn schedule(&self, after: Duration, callback: TimerCallback) -> TimerHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        self.handle.spawn(async move {
            tokio::select! {
                () = token.cancelled() => trace!("timer cancelled"),
                () = tokio::time::sleep(after) => callback(),
            }
        });
        TimerHandle::new(cancel)
    }
}

// ── Manual ───────────────────────────────────────────────────────────────────

struct PendingTimer {
    deadline: Duration,
    seq: u64,
    cancel: CancellationToken,
    callback: TimerCallback,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    pending: Vec<PendingTimer>,
}

/// Deterministic clock: time only moves when [`ManualClock::advance`] is
/// called, and due callbacks run on the caller's thread.
#[derive(Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the clock was created.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of timers that are scheduled and not cancelled.
    pub fn pending(&self) -> usize {
        self.lock()
            .pending
            .iter()
            .filter(|t| !t.cancel.is_cancelled())
            .count()
    }

    /// Move time forward and fire every timer that became due, in deadline
    /// order. Returns how many callbacks ran.
    pub fn advance(&self, by: Duration) -> usize {
        let due = {
            let mut state = self.lock();
            state.now += by;
            let now = state.now;
            let (mut due, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending)
                .into_iter()
                .filter(|t| !t.cancel.is_cancelled())
                .partition(|t| t.deadline <= now);
            state.pending = rest;
            due.sort_by_key(|t| (t.deadline, t.seq));
            due
        };

        let mut fired = 0;
        for timer in due {
            // A callback that ran earlier in this batch may have cancelled it.
            if timer.cancel.is_cancelled() {
                continue;
            }
            (timer.callback)();
            fired += 1;
        }
        fired
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn schedule(&self, after: Duration, callback: TimerCallback) -> TimerHandle {
        let cancel = CancellationToken::new();
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let deadline = state.now + after;
        state.pending.push(PendingTimer {
            deadline,
            seq,
            cancel: cancel.clone(),
            callback,
        });
        TimerHandle::new(cancel)
    }
}

impl std::fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ManualClock")
            .field("now", &state.now)
            .field("pending", &state.pending.len())
            .finish()
    }
}
