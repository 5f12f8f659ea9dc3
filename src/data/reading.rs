//! Probe reading data structures.
//!
//! Contains the per-probe fact decoded from a notification frame and the
//! payload strings it is published as.

use crate::utils::{format_one_decimal, tenths_celsius_to_fahrenheit};

/// Number of probe slots carried by every data frame.
pub const PROBE_COUNT: usize = 6;

/// One probe slot decoded from a notification frame.
///
/// The device reports temperatures as unsigned tenths of a degree Celsius.
/// A slot holding `0xFFFF` means no probe is plugged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProbeReading {
    /// Probe index (1-6).
    pub index: u8,
    /// Raw temperature in tenths of a degree Celsius. Zero when not connected.
    pub raw_tenths_celsius: u16,
    /// Whether a probe is plugged into this slot.
    pub is_connected: bool,
}

impl ProbeReading {
    /// Raw slot value reported for an unplugged probe.
    pub const NOT_CONNECTED: u16 = 0xFFFF;

    /// Build a reading from the raw slot value at zero-based `slot`.
    ///
    /// # Example
    ///
    /// ```
    /// use smoker_mqtt_bridge::ProbeReading;
    ///
    /// let reading = ProbeReading::from_raw(0, 1000);
    /// assert_eq!(reading.index, 1);
    /// assert_eq!(reading.temperature_payload(), "212.0");
    ///
    /// let missing = ProbeReading::from_raw(5, 0xFFFF);
    /// assert_eq!(missing.index, 6);
    /// assert!(!missing.is_connected);
    /// ```
    pub fn from_raw(slot: usize, value: u16) -> Self {
        let index = (slot + 1) as u8;
        if value == Self::NOT_CONNECTED {
            Self {
                index,
                raw_tenths_celsius: 0,
                is_connected: false,
            }
        } else {
            Self {
                index,
                raw_tenths_celsius: value,
                is_connected: true,
            }
        }
    }

    /// Temperature in Celsius, or `None` if the probe is not connected.
    pub fn celsius(&self) -> Option<f64> {
        self.is_connected
            .then(|| f64::from(self.raw_tenths_celsius) / 10.0)
    }

    /// Temperature in Fahrenheit, or `None` if the probe is not connected.
    pub fn fahrenheit(&self) -> Option<f64> {
        self.is_connected
            .then(|| tenths_celsius_to_fahrenheit(self.raw_tenths_celsius))
    }

    /// Payload for the probe's temperature topic.
    ///
    /// Fahrenheit with one fractional digit, or the literal `0` when no
    /// probe is plugged in.
    pub fn temperature_payload(&self) -> String {
        match self.fahrenheit() {
            Some(f) => format_one_decimal(f),
            None => "0".to_string(),
        }
    }

    /// Payload for the probe's connectivity topic.
    pub fn connected_payload(&self) -> &'static str {
        bool_payload(self.is_connected)
    }
}

impl std::fmt::Display for ProbeReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.fahrenheit() {
            Some(temp) => write!(f, "Probe {}: {:.1}°F", self.index, temp),
            None => write!(f, "Probe {}: not connected", self.index),
        }
    }
}

/// MQTT payload for a boolean fact.
pub(crate) fn bool_payload(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
