//! Probe reading publisher.
//!
//! Every data frame produces a full publish set: connectivity and
//! temperature for each of the six probes, whether or not anything changed.

use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::data::ProbeReading;
use crate::error::{Error, Result};
use crate::mqtt::SessionManager;
use crate::protocol::decode_frame;

/// Turns notification frames into probe topic publishes.
#[derive(Clone)]
pub struct ProbePublisher {
    session: Arc<SessionManager>,
}

impl ProbePublisher {
    /// Create a publisher on top of the broker session.
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// Decode a notification frame and publish its readings.
    ///
    /// Malformed frames are logged and dropped. Returns the readings that
    /// were decoded.
    pub fn handle_frame(&self, frame: &[u8]) -> Vec<ProbeReading> {
        match decode_frame(frame) {
            Ok(readings) => {
                self.publish_readings(&readings);
                readings
            }
            Err(e) => {
                warn!("Dropping frame: {} ({:02X?})", e, frame);
                Vec::new()
            }
        }
    }

    /// Publish connectivity and temperature for each reading.
    ///
    /// Publish failures never stop the remaining publishes. Returns the
    /// number of messages handed to the broker session.
    pub fn publish_readings(&self, readings: &[ProbeReading]) -> usize {
        let topics = self.session.topics();
        let mut published = 0;

        for reading in readings {
            trace!("{}", reading);

            let connected = self.publish(
                &topics.probe_connected(reading.index),
                reading.connected_payload(),
            );
            let temperature = self.publish(
                &topics.probe_temperature(reading.index),
                &reading.temperature_payload(),
            );

            published += usize::from(connected.is_ok()) + usize::from(temperature.is_ok());
        }

        published
    }

    fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        let result = self.session.publish(topic, payload);
        match &result {
            Ok(()) => {}
            Err(Error::MqttOffline) => debug!("Broker offline, dropped {}", topic),
            Err(e) => debug!("Failed to publish {}: {}", topic, e),
        }
        result
    }
}
