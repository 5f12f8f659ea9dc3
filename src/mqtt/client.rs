//! MQTT publish capability.

use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use tracing::trace;

use crate::config::MqttConfig;
use crate::error::Result;

/// Fire-and-forget publishing.
///
/// Implementations must be callable from several tasks at once and must
/// never block the caller.
#[cfg_attr(test, mockall::automock)]
pub trait Publish: Send + Sync {
    /// Publish `payload` to `topic`, non-retained.
    fn publish(&self, topic: &str, payload: &str) -> Result<()>;
}

/// [`Publish`] on top of a rumqttc client.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    qos: QoS,
}

impl MqttPublisher {
    /// Wrap a client, publishing at `qos`.
    pub fn new(client: AsyncClient, qos: QoS) -> Self {
        Self { client, qos }
    }
}

impl Publish for MqttPublisher {
    fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        trace!("Publishing {} = {:?}", topic, payload);
        self.client
            .try_publish(topic, self.qos, false, payload.as_bytes().to_vec())?;
        Ok(())
    }
}

/// Build the client and its event loop from the broker settings.
///
/// Nothing touches the network until the event loop is polled.
pub fn connect(config: &MqttConfig) -> (MqttPublisher, EventLoop) {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(config.keep_alive);
    options.set_clean_session(true);

    if let Some(credentials) = &config.credentials {
        options.set_credentials(&credentials.username, &credentials.password);
    }

    let (client, eventloop) = AsyncClient::new(options, config.request_capacity);
    (MqttPublisher::new(client, config.qos), eventloop)
}
