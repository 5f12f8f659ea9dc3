//! Bridge orchestration.
//!
//! Wires the broker session, the heartbeat and the BLE lifecycle together
//! around one shared [`BridgeState`]. The three loops run concurrently and
//! none of them is expected to finish.

use rumqttc::EventLoop;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinError};
use tracing::{error, info};

use crate::ble::transport::BleTransport;
use crate::ble::PlatformTransport;
use crate::config::BridgeConfig;
use crate::data::BridgeState;
use crate::error::{Error, Result};
use crate::heartbeat::Heartbeat;
use crate::lifecycle::{BleLifecycle, LifecyclePhase};
use crate::mqtt::{self, Publish, SessionEvents, SessionManager, Topics};

/// Background tasks aborted when dropped.
struct BackgroundTasks(Vec<AbortHandle>);

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

/// A fully wired bridge, ready to run.
pub struct Bridge<T: BleTransport, E: SessionEvents> {
    session: Arc<SessionManager>,
    heartbeat: Heartbeat,
    lifecycle: BleLifecycle<T>,
    events: E,
}

impl Bridge<PlatformTransport, EventLoop> {
    /// Build a bridge on the host Bluetooth adapter and a rumqttc client.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available. The broker is not
    /// contacted until the bridge runs.
    pub async fn start(config: &BridgeConfig) -> Result<Self> {
        let transport = PlatformTransport::new(config.scan_window).await?;
        let (publisher, eventloop) = mqtt::connect(&config.mqtt);

        info!(
            "Bridging '{}' to mqtt://{}:{}/{}",
            config.device_name, config.mqtt.host, config.mqtt.port, config.topic_prefix
        );

        Ok(Self::new(transport, Arc::new(publisher), eventloop, config))
    }
}

impl<T, E> Bridge<T, E>
where
    T: BleTransport,
    E: SessionEvents + 'static,
{
    /// Wire a bridge from its transports.
    pub fn new(transport: T, publisher: Arc<dyn Publish>, events: E, config: &BridgeConfig) -> Self {
        let session = Arc::new(SessionManager::new(
            publisher,
            Arc::new(BridgeState::new()),
            Topics::new(config.topic_prefix.clone()),
            config.retry,
        ));

        Self {
            heartbeat: Heartbeat::new(session.clone(), config.heartbeat_interval),
            lifecycle: BleLifecycle::new(transport, config, session.clone()),
            session,
            events,
        }
    }

    /// Broker session shared by every loop.
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Current BLE lifecycle phase.
    pub fn phase(&self) -> LifecyclePhase {
        self.lifecycle.phase()
    }

    /// Subscribe to BLE lifecycle phase changes.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecyclePhase> {
        self.lifecycle.subscribe()
    }

    /// Run every loop until one of them stops.
    ///
    /// The broker session and the heartbeat run as background tasks; the
    /// BLE lifecycle runs on the caller's task. Dropping the returned future
    /// stops all three.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if a background task exits, which only
    /// happens if it panicked.
    pub async fn run(self) -> Result<()> {
        let Self {
            session,
            heartbeat,
            lifecycle,
            events,
        } = self;

        let mut session_task = tokio::spawn(async move { session.run(events).await });
        let mut heartbeat_task = tokio::spawn(async move { heartbeat.run().await });

        // Aborts both tasks on every exit path
        let _tasks = BackgroundTasks(vec![
            session_task.abort_handle(),
            heartbeat_task.abort_handle(),
        ]);

        tokio::select! {
            _ = lifecycle.run() => Err(Error::Internal("BLE lifecycle stopped".to_string())),
            result = &mut session_task => Err(task_exit("MQTT session", result)),
            result = &mut heartbeat_task => Err(task_exit("heartbeat", result)),
        }
    }
}

fn task_exit(name: &str, result: std::result::Result<(), JoinError>) -> Error {
    match result {
        Ok(()) => error!("{} task stopped", name),
        Err(e) => error!("{} task failed: {}", name, e),
    }
    Error::Internal(format!("{} task stopped", name))
}
