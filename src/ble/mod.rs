//! BLE communication module.
//!
//! This module provides the Bluetooth Low Energy side of the bridge:
//! the transport seam, its btleplug implementation and the UUIDs the
//! thermometer exposes.

pub mod connection;
pub mod platform;
pub mod scanner;
pub mod transport;
pub mod uuids;

pub use platform::PlatformTransport;
pub use scanner::BleScanner;
pub use transport::{BleSession, BleTransport};
pub use uuids::*;
