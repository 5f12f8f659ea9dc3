//! Error types for the smoker-mqtt-bridge crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// No peripheral advertising the configured name was seen during a scan window.
    #[error("Device not found: {name}")]
    DeviceNotFound {
        /// The advertised name that was searched for.
        name: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// Failed to establish a connection to the device.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// A frame carried the data marker but was too short to hold six probe slots.
    #[error("Malformed frame: {len} bytes")]
    MalformedFrame {
        /// Length of the rejected frame.
        len: usize,
    },

    /// The MQTT event loop reported a connection error.
    #[error("MQTT connection error: {0}")]
    Mqtt(#[from] rumqttc::ConnectionError),

    /// The MQTT client refused a request.
    #[error("MQTT client error: {0}")]
    MqttClient(#[from] rumqttc::ClientError),

    /// A publish was attempted while no broker session is live.
    #[error("MQTT session offline")]
    MqttOffline,

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// A required parameter was not provided.
    #[error("Missing parameter: {name}")]
    MissingParameter {
        /// The name of the parameter.
        name: String,
    },

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is an expected, self-healing transport condition.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Bluetooth(_)
                | Self::DeviceNotFound { .. }
                | Self::CharacteristicNotFound { .. }
                | Self::ConnectionFailed { .. }
                | Self::Mqtt(_)
                | Self::MqttClient(_)
                | Self::MqttOffline
        )
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MalformedFrame { len: 6 };
        assert_eq!(err.to_string(), "Malformed frame: 6 bytes");

        let err = Error::InvalidParameter {
            name: "SMOKER_MQTT_PORT".to_string(),
            value: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid parameter: SMOKER_MQTT_PORT = abc");
    }

    #[test]
    fn test_is_transient() {
        assert!(Error::MqttOffline.is_transient());
        assert!(Error::DeviceNotFound {
            name: "BBQ".to_string()
        }
        .is_transient());
        assert!(!Error::MalformedFrame { len: 3 }.is_transient());
        assert!(!Error::Internal("boom".to_string()).is_transient());
    }
}
