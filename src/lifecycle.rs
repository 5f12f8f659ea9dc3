//! BLE connection lifecycle.
//!
//! Drives the thermometer link through
//! `Discovering -> Subscribing -> Connected -> Disconnected -> Discovering`
//! forever. Each transition of the shared connectivity flag is published
//! before the lifecycle moves on.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::ble::transport::{BleSession, BleTransport};
use crate::config::{BridgeConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::mqtt::SessionManager;
use crate::publisher::ProbePublisher;
use crate::retry::Backoff;

/// Phase of the BLE lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecyclePhase {
    /// Scanning for the device by name.
    #[default]
    Discovering,
    /// Connecting and subscribing to the notify characteristic.
    Subscribing,
    /// Subscribed; frames are flowing until the device drops.
    Connected,
    /// The device dropped; about to rediscover.
    Disconnected,
}

impl LifecyclePhase {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovering => write!(f, "Discovering"),
            Self::Subscribing => write!(f, "Subscribing"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Owns discovery, connection and reconnection of the thermometer.
pub struct BleLifecycle<T: BleTransport> {
    /// BLE transport.
    transport: T,
    /// Advertised device name.
    device_name: String,
    /// Notify characteristic.
    characteristic: Uuid,
    /// Broker session; also carries the shared bridge state.
    session: Arc<SessionManager>,
    /// Frame handler.
    probes: ProbePublisher,
    /// Current phase.
    phase: RwLock<LifecyclePhase>,
    /// Channel for phase changes.
    phase_tx: broadcast::Sender<LifecyclePhase>,
    /// Pacing for failed scans and connects.
    retry: RetryConfig,
}

impl<T: BleTransport> BleLifecycle<T> {
    /// Create a lifecycle for the configured device.
    pub fn new(transport: T, config: &BridgeConfig, session: Arc<SessionManager>) -> Self {
        let (phase_tx, _) = broadcast::channel(16);

        Self {
            transport,
            device_name: config.device_name.clone(),
            characteristic: config.characteristic,
            probes: ProbePublisher::new(session.clone()),
            session,
            phase: RwLock::new(LifecyclePhase::Discovering),
            phase_tx,
            retry: config.retry,
        }
    }

    /// Get the current phase.
    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.read()
    }

    /// Subscribe to phase changes.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecyclePhase> {
        self.phase_tx.subscribe()
    }

    /// Run the lifecycle forever.
    ///
    /// Every failure routes back to discovery; nothing here is fatal.
    pub async fn run(&self) {
        let mut backoff = Backoff::from(self.retry);

        loop {
            match self.run_once().await {
                Ok(()) => backoff.reset(),
                Err(e) => {
                    let delay = backoff.next_delay();
                    if e.is_transient() {
                        warn!("BLE link setup failed: {}; retrying in {:?}", e, delay);
                    } else {
                        error!("BLE link setup failed: {}; retrying in {:?}", e, delay);
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// One pass: discover, subscribe, wait for the disconnect.
    ///
    /// Returns `Ok` once a connected session has ended, or the error that
    /// stopped the pass before the device was subscribed.
    pub async fn run_once(&self) -> Result<()> {
        let address = self.discover().await;

        self.set_phase(LifecyclePhase::Subscribing);
        let session = match self
            .transport
            .connect(&address, self.characteristic)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                self.set_phase(LifecyclePhase::Discovering);
                return Err(e);
            }
        };

        info!(
            "Connected to bluetooth device {}. Subscribed to {}",
            address, self.characteristic
        );
        self.set_phase(LifecyclePhase::Connected);
        self.publish_transition(true);

        self.wait_for_disconnect(session).await;

        info!("Disconnected from bluetooth device {}. Reconnecting", address);
        self.set_phase(LifecyclePhase::Disconnected);
        self.publish_transition(false);

        self.set_phase(LifecyclePhase::Discovering);
        Ok(())
    }

    /// Scan until the device is seen.
    async fn discover(&self) -> T::Address {
        self.set_phase(LifecyclePhase::Discovering);
        let mut backoff = Backoff::from(self.retry);

        loop {
            match self.transport.scan(&self.device_name).await {
                Ok(address) => return address,
                Err(Error::DeviceNotFound { .. }) => {
                    let delay = backoff.next_delay();
                    debug!(
                        attempt = backoff.attempts(),
                        "'{}' not found; scanning again in {:?}", self.device_name, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!("Scan failed: {}; retrying in {:?}", e, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Handle frames until the disconnect signal fires.
    async fn wait_for_disconnect(&self, mut session: BleSession) {
        let mut frames_open = true;

        loop {
            tokio::select! {
                frame = session.frames.recv(), if frames_open => match frame {
                    Some(frame) => {
                        self.probes.handle_frame(&frame);
                    }
                    None => {
                        debug!("Frame channel closed; waiting for disconnect");
                        frames_open = false;
                    }
                },
                _ = &mut session.disconnected => break,
            }
        }
    }

    /// Record the connectivity flag, then publish it.
    fn publish_transition(&self, connected: bool) {
        match self.session.record_ble_connected(connected) {
            Ok(()) => debug!("Published bt-connected = {}", connected),
            Err(e) => warn!(
                "Failed to publish bt-connected = {}: {}; will republish on reconnect",
                connected, e
            ),
        }
    }

    /// Update the phase and emit an event.
    fn set_phase(&self, new_phase: LifecyclePhase) {
        let old_phase = {
            let mut phase = self.phase.write();
            let old = *phase;
            *phase = new_phase;
            old
        };

        if old_phase != new_phase {
            debug!("Lifecycle phase changed: {} -> {}", old_phase, new_phase);
            let _ = self.phase_tx.send(new_phase);
        }
    }
}
