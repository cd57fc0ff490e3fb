//! Client library for the two AIRSEP participant kinds: pilots, which
//! stream telemetry and receive forwarded commands, and consoles, which
//! arbitrate command locks and consume the broadcast feed.

pub mod console;
pub mod pilot;

pub use console::{ConsoleClient, ConsoleEvent};
pub use pilot::PilotClient;
