//! JSON configuration for the demo binaries.

pub mod batch;
pub mod export;
pub mod preset;
pub mod snap;
