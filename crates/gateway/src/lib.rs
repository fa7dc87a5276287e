//! Observer gateway.
//!
//! Passive observers connect over WebSocket and receive a `{"count": N}` frame
//! on connect and after every registry change. Nothing is read from them.

pub mod observers;
pub mod server;
pub mod state;
pub mod ws;

pub use {
    observers::{CountFrame, ObserverHub},
    server::{build_gateway_app, start_gateway},
    state::GatewayState,
};
