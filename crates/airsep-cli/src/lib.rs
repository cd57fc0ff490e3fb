//! Shared pieces for the AIRSEP command-line binaries.

pub mod scenario;
