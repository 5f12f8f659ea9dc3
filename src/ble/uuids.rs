//! BLE Service and Characteristic UUIDs.
//!
//! Contains the UUID constants used to talk to the thermometer.

use uuid::Uuid;

/// Notify characteristic carrying temperature frames.
pub const NOTIFY_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000_ffb2_0000_1000_8000_00805f9b34fb);
