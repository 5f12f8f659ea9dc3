//! Data structures for bridge data.
//!
//! This module contains the decoded probe readings and the shared
//! connectivity record reflected to the broker.

pub mod reading;
pub mod state;

pub use reading::{ProbeReading, PROBE_COUNT};
pub use state::BridgeState;
