//! Instructor → students relay.
//!
//! [`SessionController`] routes each inbound event by sender role: the
//! instructor's plain messages fan out through the [`Broadcaster`] to every
//! current subscriber, everything else is a command against the
//! [`SessionRegistry`](lectern_sessions::SessionRegistry). Registry mutations
//! are pushed to passive observers through an [`ObserverNotifier`].

pub mod broadcaster;
pub mod controller;
pub mod error;
pub mod notices;
pub mod notifier;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod testing;

pub use {
    broadcaster::{BroadcastHandle, Broadcaster, DeliveryOutcome, DeliveryStatus},
    controller::{Handled, RelayConfig, Role, SessionController, SessionHooks},
    error::{Error, Result},
    notifier::ObserverNotifier,
};
