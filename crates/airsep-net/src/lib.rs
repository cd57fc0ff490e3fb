//! Message-oriented TCP transport for AIRSEP.
//!
//! Turns a raw byte stream into framed line events with an ordered send
//! queue, a low-rate keepalive, and deterministic teardown. Owners
//! receive [`NetEvent`]s over a channel; no callbacks cross task
//! boundaries.

pub mod connection;
pub mod listener;

pub use connection::{ConnId, Connection, NetError, NetEvent, Role, DEFAULT_READ_TIMEOUT};
pub use listener::Listener;
