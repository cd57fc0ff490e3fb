//! AIRSEP coordinator library: configuration, the coordinator actor, and
//! server wiring. The binary in `main.rs` is a thin shell over this.

pub mod config;
pub mod coordinator;
pub mod server;

pub use config::Config;
pub use server::Server;
