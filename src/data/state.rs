//! Shared bridge state.
//!
//! The single connectivity fact shared between the BLE lifecycle (the only
//! writer) and the MQTT session manager (a reader).

use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide record of whether the BLE peripheral is connected.
///
/// Starts disconnected and lives for the life of the process.
#[derive(Debug, Default)]
pub struct BridgeState {
    /// Whether the peripheral is currently connected and subscribed.
    ble_connected: AtomicBool,
}

impl BridgeState {
    /// Create a new state record (disconnected).
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the BLE peripheral is currently connected.
    pub fn ble_connected(&self) -> bool {
        self.ble_connected.load(Ordering::SeqCst)
    }

    /// Record the BLE connectivity flag.
    ///
    /// Returns `true` if the stored value changed.
    pub fn set_ble_connected(&self, connected: bool) -> bool {
        self.ble_connected.swap(connected, Ordering::SeqCst) != connected
    }
}
