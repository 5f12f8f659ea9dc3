//! MQTT session management.
//!
//! One task owns the client's event loop and drives it forever. Polling
//! the loop after a failure is what reconnects it, so reconnect attempts
//! are serialized by construction: there is never more than one in flight.
//!
//! On every ConnAck the current bridge state goes out before the session is
//! marked live; publishes from other tasks are dropped until then, and
//! anything the client still held from the previous session is discarded,
//! so the state is always the first message a subscriber sees after a
//! reconnect. BLE transitions are serialized against the ConnAck handling
//! so the broker never keeps a stale flag.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rumqttc::{Event, EventLoop, Packet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::RetryConfig;
use crate::data::reading::bool_payload;
use crate::data::BridgeState;
use crate::error::{Error, Result};
use crate::mqtt::client::Publish;
use crate::mqtt::topics::Topics;
use crate::retry::Backoff;

/// Broker session events the manager reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The broker acknowledged a (re)connect.
    Connected,
    /// The broker closed the session.
    Disconnected,
    /// Any other traffic.
    Other,
}

/// Source of broker session events.
#[async_trait]
pub trait SessionEvents: Send {
    /// Wait for the next event, (re)connecting as needed.
    ///
    /// An error means the connection attempt failed or the session dropped.
    async fn next_event(&mut self) -> Result<SessionEvent>;

    /// Drop every request still queued from the previous session.
    ///
    /// Called once the session is marked offline. Returns how many requests
    /// were dropped.
    fn discard_queued(&mut self) -> usize;
}

#[async_trait]
impl SessionEvents for EventLoop {
    async fn next_event(&mut self) -> Result<SessionEvent> {
        let event = match self.poll().await? {
            Event::Incoming(Packet::ConnAck(_)) => SessionEvent::Connected,
            Event::Incoming(Packet::Disconnect) => SessionEvent::Disconnected,
            _ => SessionEvent::Other,
        };
        Ok(event)
    }

    fn discard_queued(&mut self) -> usize {
        // Moves unacked and channel requests into `pending`, then drops them
        self.clean();
        let discarded = self.pending.len();
        self.pending.clear();
        discarded
    }
}

/// Keeps the broker session alive and reflects bridge state to it.
pub struct SessionManager {
    /// Raw publish capability.
    publisher: Arc<dyn Publish>,
    /// Shared connectivity record.
    state: Arc<BridgeState>,
    /// Topic namespace.
    topics: Topics,
    /// Whether the broker session is live. Held for reading across every
    /// gated publish.
    online: RwLock<bool>,
    /// Serializes BLE transitions against ConnAck handling.
    link: Mutex<()>,
    /// Successful connects since startup.
    connects: AtomicU64,
    /// Pacing for failed connects.
    retry: RetryConfig,
}

impl SessionManager {
    /// Create a session manager publishing through `publisher`.
    pub fn new(
        publisher: Arc<dyn Publish>,
        state: Arc<BridgeState>,
        topics: Topics,
        retry: RetryConfig,
    ) -> Self {
        Self {
            publisher,
            state,
            topics,
            online: RwLock::new(false),
            link: Mutex::new(()),
            connects: AtomicU64::new(0),
            retry,
        }
    }

    /// Topic namespace in use.
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Shared bridge state.
    pub fn state(&self) -> &Arc<BridgeState> {
        &self.state
    }

    /// Whether the broker session is live.
    pub fn is_online(&self) -> bool {
        *self.online.read()
    }

    /// Number of successful connects since startup.
    pub fn connect_count(&self) -> u64 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Publish while the session is live.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MqttOffline`] when no session is live; the message
    /// is dropped, not buffered.
    pub fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        let online = self.online.read();
        if !*online {
            return Err(Error::MqttOffline);
        }
        self.publisher.publish(topic, payload)
    }

    /// Record a BLE connectivity transition and publish it.
    ///
    /// The flag is always recorded. While the broker is offline the publish
    /// is dropped and the flag goes out with the next ConnAck instead.
    pub fn record_ble_connected(&self, connected: bool) -> Result<()> {
        let _link = self.link.lock();

        if self.state.set_ble_connected(connected) {
            debug!("BLE connectivity changed to {}", connected);
        }
        self.publish(&self.topics.bt_connected(), bool_payload(connected))
    }

    /// Handle a ConnAck: republish state, then open the session to others.
    pub fn on_connect(&self) {
        let _link = self.link.lock();

        let count = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        let payload = bool_payload(self.state.ble_connected());

        info!(connects = count, "Connected to MQTT broker");

        if let Err(e) = self
            .publisher
            .publish(&self.topics.bt_connected(), payload)
        {
            warn!("Failed to publish bridge state on connect: {}", e);
        } else {
            debug!("Republished bt-connected = {}", payload);
        }

        *self.online.write() = true;
    }

    /// Handle a lost or closed session.
    pub fn on_disconnect(&self) {
        let was_online = std::mem::replace(&mut *self.online.write(), false);
        if was_online {
            warn!("Disconnected from MQTT broker, reconnecting");
        }
    }

    /// Go offline, then drop whatever the previous session left queued.
    fn go_offline<E: SessionEvents>(&self, events: &mut E) {
        self.on_disconnect();

        let discarded = events.discard_queued();
        if discarded > 0 {
            debug!("Discarded {} queued requests from the previous session", discarded);
        }
    }

    /// Drive the broker session forever.
    ///
    /// Connect failures are logged and retried without limit, paced by an
    /// exponential backoff that resets on every successful connect.
    pub async fn run<E: SessionEvents>(&self, mut events: E) {
        let mut backoff = Backoff::from(self.retry);

        loop {
            match events.next_event().await {
                Ok(SessionEvent::Connected) => {
                    backoff.reset();
                    self.on_connect();
                }
                Ok(SessionEvent::Disconnected) => self.go_offline(&mut events),
                Ok(SessionEvent::Other) => {}
                Err(e) => {
                    self.go_offline(&mut events);
                    let delay = backoff.next_delay();
                    warn!(
                        attempt = backoff.attempts(),
                        "MQTT connection failed: {}; retrying in {:?}", e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt::client::MockPublish;
    use crate::config::MqttConfig;
    use crate::mqtt::client::connect;
    use crate::testing::{RecordingPublisher, ScriptedEvents};
    use pretty_assertions::assert_eq;
    use std::sync::Weak;
    use std::thread::JoinHandle;
    use std::time::Duration;

    fn manager(publisher: Arc<dyn Publish>, state: Arc<BridgeState>) -> SessionManager {
        SessionManager::new(
            publisher,
            state,
            Topics::default(),
            RetryConfig {
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(100),
            },
        )
    }

    #[test]
    fn test_publish_offline_is_dropped() {
        let mut mock = MockPublish::new();
        mock.expect_publish().never();

        let session = manager(Arc::new(mock), Arc::new(BridgeState::new()));
        assert!(matches!(
            session.publish("smoker/heartbeat", ""),
            Err(Error::MqttOffline)
        ));
    }

    #[test]
    fn test_on_connect_publishes_state_first() {
        let mut mock = MockPublish::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_publish()
            .withf(|topic: &str, payload: &str| topic == "smoker/bt-connected" && payload == "true")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mock.expect_publish()
            .withf(|topic: &str, _payload: &str| topic == "smoker/heartbeat")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let state = Arc::new(BridgeState::new());
        state.set_ble_connected(true);

        let session = manager(Arc::new(mock), state);
        session.on_connect();
        assert!(session.is_online());
        session.publish("smoker/heartbeat", "").unwrap();
    }

    #[test]
    fn test_on_connect_survives_publish_failure() {
        let mut mock = MockPublish::new();
        mock.expect_publish()
            .returning(|_, _| Err(Error::MqttOffline));

        let session = manager(Arc::new(mock), Arc::new(BridgeState::new()));
        session.on_connect();
        assert!(session.is_online());
        assert_eq!(session.connect_count(), 1);
    }

    #[test]
    fn test_repeated_reconnects_reflect_latest_state() {
        let recorder = Arc::new(RecordingPublisher::new());
        let state = Arc::new(BridgeState::new());
        let session = manager(recorder.clone(), state.clone());

        session.on_connect();
        session.on_disconnect();
        session.on_connect();
        state.set_ble_connected(true);
        session.on_disconnect();
        session.on_connect();

        assert_eq!(
            recorder.payloads_for("smoker/bt-connected"),
            vec!["false", "false", "true"]
        );
        assert_eq!(session.connect_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_reconnects_once_and_republishes_first() {
        let recorder = Arc::new(RecordingPublisher::new());
        let state = Arc::new(BridgeState::new());
        let session = Arc::new(manager(recorder.clone(), state.clone()));

        let (events, control) = ScriptedEvents::new();
        let runner = tokio::spawn({
            let session = session.clone();
            async move { session.run(events).await }
        });

        control.send(Ok(SessionEvent::Connected)).await;
        assert!(session.is_online());
        session.publish("smoker/heartbeat", "").unwrap();

        state.set_ble_connected(true);
        control
            .send(Err(Error::Mqtt(rumqttc::ConnectionError::RequestsDone)))
            .await;
        assert!(!session.is_online());

        // Dropped while offline
        assert!(session.publish("smoker/heartbeat", "").is_err());

        control.send(Ok(SessionEvent::Connected)).await;
        session.publish("smoker/heartbeat", "").unwrap();

        runner.abort();

        assert_eq!(control.delivered(), 3);
        assert_eq!(
            recorder.published(),
            vec![
                ("smoker/bt-connected".to_string(), "false".to_string()),
                ("smoker/heartbeat".to_string(), String::new()),
                ("smoker/bt-connected".to_string(), "true".to_string()),
                ("smoker/heartbeat".to_string(), String::new()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failures_retry_until_success() {
        let recorder = Arc::new(RecordingPublisher::new());
        let session = Arc::new(manager(recorder.clone(), Arc::new(BridgeState::new())));

        let (events, control) = ScriptedEvents::new();
        let runner = tokio::spawn({
            let session = session.clone();
            async move { session.run(events).await }
        });

        for _ in 0..5 {
            control
                .send(Err(Error::ConnectionFailed {
                    reason: "refused".to_string(),
                }))
                .await;
            assert!(!session.is_online());
        }
        control.send(Ok(SessionEvent::Connected)).await;

        runner.abort();

        assert!(session.is_online());
        assert_eq!(session.connect_count(), 1);
        assert_eq!(recorder.payloads_for("smoker/bt-connected"), vec!["false"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broker_disconnect_packet_goes_offline() {
        let recorder = Arc::new(RecordingPublisher::new());
        let session = Arc::new(manager(recorder.clone(), Arc::new(BridgeState::new())));

        let (events, control) = ScriptedEvents::new();
        let runner = tokio::spawn({
            let session = session.clone();
            async move { session.run(events).await }
        });

        control.send(Ok(SessionEvent::Connected)).await;
        control.send(Ok(SessionEvent::Other)).await;
        assert!(session.is_online());
        control.send(Ok(SessionEvent::Disconnected)).await;
        assert!(!session.is_online());

        runner.abort();
    }

    /// Flips the BLE flag from another thread while the first publish (the
    /// ConnAck state) is still in progress.
    struct TransitionDuringConnect {
        recorder: RecordingPublisher,
        session: Mutex<Weak<SessionManager>>,
        worker: Mutex<Option<JoinHandle<()>>>,
    }

    impl Publish for TransitionDuringConnect {
        fn publish(&self, topic: &str, payload: &str) -> Result<()> {
            self.recorder.publish(topic, payload)?;

            let mut worker = self.worker.lock();
            if worker.is_none() {
                if let Some(session) = self.session.lock().upgrade() {
                    *worker = Some(std::thread::spawn(move || {
                        let _ = session.record_ble_connected(true);
                    }));
                    // Let the transition race the rest of the connect
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_transition_during_connect_reaches_broker() {
        let publisher = Arc::new(TransitionDuringConnect {
            recorder: RecordingPublisher::new(),
            session: Mutex::new(Weak::new()),
            worker: Mutex::new(None),
        });
        let state = Arc::new(BridgeState::new());
        let session = Arc::new(manager(publisher.clone(), state.clone()));
        *publisher.session.lock() = Arc::downgrade(&session);

        session.on_connect();

        let worker = publisher.worker.lock().take().unwrap();
        worker.join().unwrap();

        assert!(state.ble_connected());
        assert_eq!(
            publisher.recorder.payloads_for("smoker/bt-connected"),
            vec!["false", "true"]
        );
    }

    #[test]
    fn test_transition_while_offline_is_recorded_and_republished() {
        let recorder = Arc::new(RecordingPublisher::new());
        let state = Arc::new(BridgeState::new());
        let session = manager(recorder.clone(), state.clone());

        assert!(matches!(
            session.record_ble_connected(true),
            Err(Error::MqttOffline)
        ));
        assert!(state.ble_connected());
        assert!(recorder.published().is_empty());

        session.on_connect();
        tokio_test::assert_ok!(session.record_ble_connected(false));

        assert_eq!(
            recorder.payloads_for("smoker/bt-connected"),
            vec!["true", "false"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_requests_discarded_once_offline() {
        let recorder = Arc::new(RecordingPublisher::new());
        let session = Arc::new(manager(recorder, Arc::new(BridgeState::new())));

        let (events, control) = ScriptedEvents::new();
        let runner = tokio::spawn({
            let session = session.clone();
            async move { session.run(events).await }
        });

        control.send(Ok(SessionEvent::Connected)).await;
        assert_eq!(control.discards(), 0);

        control
            .send(Err(Error::Mqtt(rumqttc::ConnectionError::RequestsDone)))
            .await;
        assert_eq!(control.discards(), 1);

        control.send(Ok(SessionEvent::Connected)).await;
        control.send(Ok(SessionEvent::Disconnected)).await;
        assert_eq!(control.discards(), 2);

        runner.abort();
    }

    #[test]
    fn test_event_loop_drops_previous_session_requests() {
        let (publisher, mut eventloop) = connect(&MqttConfig::default());

        // Queued while the old session looked live
        publisher.publish("smoker/probe/1/temperature", "212.0").unwrap();
        publisher.publish("smoker/heartbeat", "").unwrap();

        assert_eq!(eventloop.discard_queued(), 2);
        assert!(eventloop.pending.is_empty());

        // The ConnAck state is then the only request left to send
        publisher.publish("smoker/bt-connected", "true").unwrap();
        eventloop.clean();

        let topics: Vec<_> = eventloop
            .pending
            .iter()
            .map(|request| match request {
                rumqttc::Request::Publish(publish) => publish.topic.clone(),
                other => format!("{:?}", other),
            })
            .collect();
        assert_eq!(topics, vec!["smoker/bt-connected"]);
    }
}
