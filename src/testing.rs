//! Test doubles for the transport seams.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::ble::transport::{BleSession, BleTransport};
use crate::error::{Error, Result};
use crate::mqtt::client::Publish;
use crate::mqtt::session::{SessionEvent, SessionEvents};

/// Records every publish in order.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, String)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().clone()
    }

    pub fn payloads_for(&self, topic: &str) -> Vec<String> {
        self.published
            .lock()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

impl Publish for RecordingPublisher {
    fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        self.published
            .lock()
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}

/// Session events fed one at a time by a [`ScriptedControl`].
pub struct ScriptedEvents {
    events: mpsc::Receiver<Result<SessionEvent>>,
    waiting: mpsc::UnboundedSender<()>,
    discards: Arc<AtomicUsize>,
}

/// Feeds a [`ScriptedEvents`] and waits for each event to be handled.
pub struct ScriptedControl {
    events: mpsc::Sender<Result<SessionEvent>>,
    waiting: tokio::sync::Mutex<mpsc::UnboundedReceiver<()>>,
    delivered: AtomicUsize,
    discards: Arc<AtomicUsize>,
}

impl ScriptedEvents {
    pub fn new() -> (Self, ScriptedControl) {
        let (events_tx, events_rx) = mpsc::channel(1);
        let (waiting_tx, waiting_rx) = mpsc::unbounded_channel();
        let discards = Arc::new(AtomicUsize::new(0));
        (
            Self {
                events: events_rx,
                waiting: waiting_tx,
                discards: discards.clone(),
            },
            ScriptedControl {
                events: events_tx,
                waiting: tokio::sync::Mutex::new(waiting_rx),
                delivered: AtomicUsize::new(0),
                discards,
            },
        )
    }
}

#[async_trait]
impl SessionEvents for ScriptedEvents {
    async fn next_event(&mut self) -> Result<SessionEvent> {
        let _ = self.waiting.send(());
        match self.events.recv().await {
            Some(event) => event,
            None => futures::future::pending().await,
        }
    }

    fn discard_queued(&mut self) -> usize {
        self.discards.fetch_add(1, Ordering::SeqCst);
        0
    }
}

impl ScriptedControl {
    /// Deliver `event` once the manager is waiting, then wait until it has
    /// been handled and the manager is waiting again.
    pub async fn send(&self, event: Result<SessionEvent>) {
        let mut waiting = self.waiting.lock().await;
        if self.delivered() == 0 {
            waiting.recv().await;
        }
        self.events
            .send(event)
            .await
            .expect("session manager stopped");
        self.delivered.fetch_add(1, Ordering::SeqCst);
        waiting.recv().await;
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    /// Times the manager asked to drop queued requests.
    pub fn discards(&self) -> usize {
        self.discards.load(Ordering::SeqCst)
    }
}

/// Test-side handle of a [`BleSession`].
pub struct FakeSession {
    frames: mpsc::Sender<Bytes>,
    disconnected: Mutex<Option<oneshot::Sender<()>>>,
}

impl FakeSession {
    pub fn new() -> (BleSession, Self) {
        let (frames_tx, frames_rx) = mpsc::channel(16);
        let (disconnected_tx, disconnected_rx) = oneshot::channel();
        (
            BleSession::new(frames_rx, disconnected_rx),
            Self {
                frames: frames_tx,
                disconnected: Mutex::new(Some(disconnected_tx)),
            },
        )
    }

    pub async fn send_frame(&self, frame: &[u8]) {
        self.frames
            .send(Bytes::copy_from_slice(frame))
            .await
            .expect("session dropped");
    }

    pub fn disconnect(&self) {
        if let Some(tx) = self.disconnected.lock().take() {
            let _ = tx.send(());
        }
    }
}

/// BLE transport answering from scripted results.
#[derive(Default)]
pub struct FakeTransport {
    scans: Mutex<VecDeque<Result<String>>>,
    sessions: Mutex<VecDeque<Result<BleSession>>>,
    scan_calls: AtomicUsize,
    connect_calls: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scans(self, scans: Vec<Result<String>>) -> Self {
        self.scans.lock().extend(scans);
        self
    }

    pub fn with_sessions(self, sessions: Vec<Result<BleSession>>) -> Self {
        self.sessions.lock().extend(sessions);
        self
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BleTransport for FakeTransport {
    type Address = String;

    async fn scan(&self, name: &str) -> Result<String> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.scans.lock().pop_front();
        next.unwrap_or_else(|| {
            Err(Error::DeviceNotFound {
                name: name.to_string(),
            })
        })
    }

    async fn connect(&self, address: &String, _characteristic: Uuid) -> Result<BleSession> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.sessions.lock().pop_front();
        next.unwrap_or_else(|| {
            Err(Error::ConnectionFailed {
                reason: format!("{} unreachable", address),
            })
        })
    }
}
