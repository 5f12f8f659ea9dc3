//! Bridge configuration.
//!
//! All inputs are static: they are read once at startup, either built in
//! code or taken from `SMOKER_*` environment variables.

use rumqttc::QoS;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::ble::uuids::NOTIFY_CHARACTERISTIC_UUID;
use crate::error::{Error, Result};

/// Default MQTT broker host.
pub const DEFAULT_MQTT_HOST: &str = "127.0.0.1";
/// Default MQTT broker port.
pub const DEFAULT_MQTT_PORT: u16 = 1883;
/// Default MQTT client identifier.
pub const DEFAULT_CLIENT_ID: &str = "smoker-mqtt-bridge";
/// Default topic namespace root.
pub const DEFAULT_TOPIC_PREFIX: &str = "smoker";
/// Default heartbeat period.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Static username/password pair presented to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Broker username.
    pub username: String,
    /// Broker password.
    pub password: String,
}

/// MQTT broker settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MqttConfig {
    /// Broker host name or address.
    pub host: String,
    /// Broker TCP port.
    pub port: u16,
    /// Optional static credentials.
    pub credentials: Option<Credentials>,
    /// Client identifier.
    pub client_id: String,
    /// Keep-alive interval.
    pub keep_alive: Duration,
    /// Quality of service used for every publish.
    pub qos: QoS,
    /// Capacity of the client request channel.
    pub request_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MQTT_HOST.to_string(),
            port: DEFAULT_MQTT_PORT,
            credentials: None,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            keep_alive: Duration::from_secs(60),
            qos: QoS::AtMostOnce,
            request_capacity: 64,
        }
    }
}

/// Delay bounds for retrying failed connects and scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Advertised name of the BLE thermometer.
    pub device_name: String,
    /// Notification characteristic carrying temperature frames.
    pub characteristic: Uuid,
    /// Length of one BLE scan window.
    pub scan_window: Duration,
    /// Broker settings.
    pub mqtt: MqttConfig,
    /// Root of the published topic namespace.
    pub topic_prefix: String,
    /// Heartbeat period.
    pub heartbeat_interval: Duration,
    /// Retry pacing for BLE and MQTT loops.
    pub retry: RetryConfig,
}

impl BridgeConfig {
    /// Create a configuration for the named device with default settings.
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            characteristic: NOTIFY_CHARACTERISTIC_UUID,
            scan_window: Duration::from_secs(10),
            mqtt: MqttConfig::default(),
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            retry: RetryConfig::default(),
        }
    }

    /// Set the broker address.
    pub fn with_broker(mut self, host: impl Into<String>, port: u16) -> Self {
        self.mqtt.host = host.into();
        self.mqtt.port = port;
        self
    }

    /// Set static broker credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.mqtt.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Set the notification characteristic.
    pub fn with_characteristic(mut self, characteristic: Uuid) -> Self {
        self.characteristic = characteristic;
        self
    }

    /// Set the topic namespace root.
    pub fn with_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = prefix.into();
        self
    }

    /// Set the heartbeat period.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the retry pacing.
    pub fn with_retry(mut self, initial_delay: Duration, max_delay: Duration) -> Self {
        self.retry = RetryConfig {
            initial_delay,
            max_delay,
        };
        self
    }

    /// Load the configuration from `SMOKER_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `SMOKER_BLE_NAME` is unset or any value fails to parse.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Build the configuration from a set of variables.
    pub(crate) fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let device_name = vars
            .get("SMOKER_BLE_NAME")
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::MissingParameter {
                name: "SMOKER_BLE_NAME".to_string(),
            })?;

        let mut config = Self::new(device_name.clone());

        if let Some(uuid) = parse_var::<Uuid>(&vars, "SMOKER_BLE_CHARACTERISTIC")? {
            config.characteristic = uuid;
        }
        if let Some(secs) = parse_var::<u64>(&vars, "SMOKER_BLE_SCAN_SECS")? {
            config.scan_window = Duration::from_secs(secs);
        }
        if let Some(host) = vars.get("SMOKER_MQTT_HOST") {
            config.mqtt.host = host.clone();
        }
        if let Some(port) = parse_var::<u16>(&vars, "SMOKER_MQTT_PORT")? {
            config.mqtt.port = port;
        }
        match (vars.get("SMOKER_MQTT_USER"), vars.get("SMOKER_MQTT_PASSWORD")) {
            (Some(username), Some(password)) => {
                config = config.with_credentials(username.clone(), password.clone());
            }
            (None, None) => {}
            (Some(_), None) => {
                return Err(Error::MissingParameter {
                    name: "SMOKER_MQTT_PASSWORD".to_string(),
                })
            }
            (None, Some(_)) => {
                return Err(Error::MissingParameter {
                    name: "SMOKER_MQTT_USER".to_string(),
                })
            }
        }
        if let Some(client_id) = vars.get("SMOKER_MQTT_CLIENT_ID") {
            if client_id.trim().is_empty() || client_id.starts_with(' ') {
                return Err(Error::InvalidParameter {
                    name: "SMOKER_MQTT_CLIENT_ID".to_string(),
                    value: client_id.clone(),
                });
            }
            config.mqtt.client_id = client_id.clone();
        }
        if let Some(secs) = parse_var::<u64>(&vars, "SMOKER_MQTT_KEEP_ALIVE_SECS")? {
            config.mqtt.keep_alive = Duration::from_secs(secs);
        }
        if let Some(level) = parse_var::<u8>(&vars, "SMOKER_MQTT_QOS")? {
            config.mqtt.qos = qos_from_level(level)?;
        }
        if let Some(prefix) = vars.get("SMOKER_TOPIC_PREFIX") {
            config.topic_prefix = prefix.trim_end_matches('/').to_string();
        }
        if let Some(secs) = parse_var::<u64>(&vars, "SMOKER_HEARTBEAT_SECS")? {
            if secs == 0 {
                return Err(Error::InvalidParameter {
                    name: "SMOKER_HEARTBEAT_SECS".to_string(),
                    value: secs.to_string(),
                });
            }
            config.heartbeat_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

/// Map a numeric QoS level to the MQTT client's type.
pub fn qos_from_level(level: u8) -> Result<QoS> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(Error::InvalidParameter {
            name: "SMOKER_MQTT_QOS".to_string(),
            value: other.to_string(),
        }),
    }
}

fn parse_var<T: FromStr>(vars: &HashMap<String, String>, name: &str) -> Result<Option<T>> {
    match vars.get(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::InvalidParameter {
                name: name.to_string(),
                value: raw.clone(),
            }),
    }
}
