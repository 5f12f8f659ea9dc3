//! btleplug-backed [`BleTransport`].

use async_trait::async_trait;
use btleplug::platform::PeripheralId;
use std::time::Duration;
use uuid::Uuid;

use crate::ble::connection::open_session;
use crate::ble::scanner::BleScanner;
use crate::ble::transport::{BleSession, BleTransport};
use crate::error::Result;

/// BLE transport on the host's Bluetooth adapter.
pub struct PlatformTransport {
    scanner: BleScanner,
    scan_window: Duration,
}

impl PlatformTransport {
    /// Open the first available adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new(scan_window: Duration) -> Result<Self> {
        Ok(Self {
            scanner: BleScanner::new().await?,
            scan_window,
        })
    }
}

#[async_trait]
impl BleTransport for PlatformTransport {
    type Address = PeripheralId;

    async fn scan(&self, name: &str) -> Result<PeripheralId> {
        self.scanner.find_by_name(name, self.scan_window).await
    }

    async fn connect(&self, address: &PeripheralId, characteristic: Uuid) -> Result<BleSession> {
        open_session(self.scanner.adapter(), address, characteristic).await
    }
}
