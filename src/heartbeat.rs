//! Liveness beacon.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::error::Result;
use crate::mqtt::SessionManager;

/// Publishes an empty message to the heartbeat topic on a fixed period,
/// independent of BLE state.
pub struct Heartbeat {
    session: Arc<SessionManager>,
    interval: Duration,
}

impl Heartbeat {
    /// Create a heartbeat with the given period.
    pub fn new(session: Arc<SessionManager>, interval: Duration) -> Self {
        Self { session, interval }
    }

    /// Publish a single beat.
    pub fn beat(&self) -> Result<()> {
        self.session
            .publish(&self.session.topics().heartbeat(), "")
    }

    /// Beat forever. Failures are logged and the loop carries on.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.beat() {
                Ok(()) => trace!("Heartbeat sent"),
                Err(e) => debug!("Heartbeat not sent: {}", e),
            }
        }
    }
}
