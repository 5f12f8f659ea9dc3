//! BLE transport abstraction.
//!
//! The bridge consumes the BLE stack through [`BleTransport`]: one call to
//! find the device by advertised name, one to open a subscribed session.
//! A [`BleSession`] hands back the notification frames and a one-shot
//! disconnect signal in place of callbacks.

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use std::fmt::{Debug, Display};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;

/// Capability to discover and connect to a BLE peripheral.
#[async_trait]
pub trait BleTransport: Send + Sync {
    /// Address of a discovered peripheral.
    type Address: Clone + Debug + Display + Send + Sync;

    /// Scan for one window and return the address of the first peripheral
    /// advertising exactly `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`](crate::Error::DeviceNotFound) if no
    /// matching advertisement was seen.
    async fn scan(&self, name: &str) -> Result<Self::Address>;

    /// Connect to `address` and subscribe to `characteristic`.
    ///
    /// The disconnect signal is armed before the subscription is made, so a
    /// drop that happens right after subscribing is still reported.
    async fn connect(&self, address: &Self::Address, characteristic: Uuid) -> Result<BleSession>;
}

/// A live, subscribed BLE session.
pub struct BleSession {
    /// Notification frames from the subscribed characteristic.
    pub frames: mpsc::Receiver<Bytes>,
    /// Fires once when the peripheral disconnects.
    pub disconnected: oneshot::Receiver<()>,
    /// Helper tasks owned by this session.
    tasks: Vec<JoinHandle<()>>,
    /// Link teardown spawned when the session is dropped.
    teardown: Option<BoxFuture<'static, ()>>,
}

impl BleSession {
    /// Create a session from its frame channel and disconnect signal.
    pub fn new(frames: mpsc::Receiver<Bytes>, disconnected: oneshot::Receiver<()>) -> Self {
        Self {
            frames,
            disconnected,
            tasks: Vec::new(),
            teardown: None,
        }
    }

    /// Attach helper tasks that are aborted when the session is dropped.
    pub fn with_tasks(mut self, tasks: Vec<JoinHandle<()>>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    /// Run `teardown` on the current runtime once the session is dropped,
    /// e.g. to close the link to the peripheral.
    pub fn with_teardown(mut self, teardown: BoxFuture<'static, ()>) -> Self {
        self.teardown = Some(teardown);
        self
    }
}

impl Drop for BleSession {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }

        if let Some(teardown) = self.teardown.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(teardown);
                }
                Err(_) => debug!("No runtime to tear down the BLE link"),
            }
        }
    }
}

impl Debug for BleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleSession")
            .field("tasks", &self.tasks.len())
            .field("teardown", &self.teardown.is_some())
            .finish_non_exhaustive()
    }
}
