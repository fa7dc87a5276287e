//! Channel-facing types for the lectern relay.
//!
//! Inbound events arrive from a messaging platform already decoded into a
//! [`MessageBody`]; the [`classify`] module decides whether an event is a
//! command or a broadcastable [`Payload`], and [`ChannelOutbound`] is the send
//! capability a platform adapter implements.

pub mod classify;
pub mod error;
pub mod outbound;
pub mod types;

pub use {
    classify::{Classification, Command, classify},
    error::{Error, Result},
    outbound::ChannelOutbound,
    types::{InboundEvent, MessageBody, Payload, Sender, SubscriberId},
};
