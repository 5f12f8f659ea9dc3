//! BLE scanning functionality.
//!
//! Finds the thermometer by its advertised name.

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures::stream::StreamExt;
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::error::{Error, Result};

/// BLE scanner for discovering a peripheral by name.
#[derive(Clone)]
pub struct BleScanner {
    /// The BLE adapter to use for scanning.
    adapter: Adapter,
}

impl BleScanner {
    /// Create a new BLE scanner on the first available adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self { adapter })
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Scan for up to `window` and return the first peripheral whose
    /// advertised name equals `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] if no matching peripheral was seen
    /// within the window.
    pub async fn find_by_name(&self, name: &str, window: Duration) -> Result<PeripheralId> {
        let mut events = self.adapter.events().await.map_err(Error::Bluetooth)?;

        debug!("Scanning for '{}' ({:?} window)", name, window);

        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(Error::Bluetooth)?;

        let found = tokio::time::timeout(window, async {
            // The adapter may already know the device from an earlier scan
            if let Some(id) = self.find_known(name).await {
                return Some(id);
            }

            while let Some(event) = events.next().await {
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        if self.has_name(&id, name).await {
                            return Some(id);
                        }
                    }
                    _ => {}
                }
            }

            None
        })
        .await
        .ok()
        .flatten();

        if let Err(e) = self.adapter.stop_scan().await {
            debug!("Failed to stop scan: {}", e);
        }

        match found {
            Some(id) => {
                info!("Found '{}' at {}", name, id);
                Ok(id)
            }
            None => Err(Error::DeviceNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Look through peripherals the adapter already knows about.
    async fn find_known(&self, name: &str) -> Option<PeripheralId> {
        let peripherals = self.adapter.peripherals().await.ok()?;

        for peripheral in peripherals {
            let id = peripheral.id();
            if self.has_name(&id, name).await {
                return Some(id);
            }
        }

        None
    }

    /// Check whether a peripheral advertises exactly `name`.
    async fn has_name(&self, id: &PeripheralId, name: &str) -> bool {
        let peripheral = match self.adapter.peripheral(id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return false;
            }
        };

        let properties = match peripheral.properties().await {
            Ok(Some(p)) => p,
            _ => return false,
        };

        trace!("Advertisement from {}: {:?}", id, properties.local_name);

        name_matches(properties.local_name.as_deref(), name)
    }
}

/// Advertised names must match exactly.
pub(crate) fn name_matches(advertised: Option<&str>, wanted: &str) -> bool {
    advertised == Some(wanted)
}
