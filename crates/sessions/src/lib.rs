//! Subscriber sessions: who is currently enrolled, and for how long.
//!
//! [`SessionRegistry`] is the single source of truth for the subscriber set.
//! Every entry owns one expiry timer scheduled through an injected [`Clock`],
//! so tests can drive expiry with [`ManualClock`] instead of waiting on wall
//! time.

pub mod clock;
pub mod error;
pub mod registry;

pub use {
    clock::{Clock, ManualClock, TimerCallback, TimerHandle, TokioClock},
    error::{Error, Result},
    registry::{
        DEFAULT_SESSION_TTL, SessionEvent, SessionListener, SessionRegistry, SubscribeOutcome,
        UnsubscribeOutcome,
    },
};
