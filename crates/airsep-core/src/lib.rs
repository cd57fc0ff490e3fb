//! Core logic for AIRSEP cooperative separation monitoring: flight math,
//! aircraft state, the text wire codec, and the pairwise collision engine.

pub mod aircraft;
pub mod conflict;
pub mod math;
pub mod rules;
pub mod wire;

pub use aircraft::{Aircraft, AircraftState, ThreatLevel};
pub use conflict::{CollisionEngine, PairFlag, SweepReport, Violation};
pub use math::{Ray, Rotator, Vector3};
pub use rules::SeparationRules;
pub use wire::{Message, WireError};
