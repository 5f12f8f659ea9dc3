//! MQTT topic namespace.
//!
//! | Topic | Payload |
//! |---|---|
//! | `{prefix}/bt-connected` | `true`/`false` |
//! | `{prefix}/probe/{1..6}/connected` | `true`/`false` |
//! | `{prefix}/probe/{1..6}/temperature` | Fahrenheit, one decimal, `0` if unplugged |
//! | `{prefix}/heartbeat` | empty |

use crate::config::DEFAULT_TOPIC_PREFIX;

/// Topic names under a common prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    prefix: String,
}

impl Topics {
    /// Create the namespace rooted at `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The namespace root.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// BLE connectivity flag.
    pub fn bt_connected(&self) -> String {
        format!("{}/bt-connected", self.prefix)
    }

    /// Liveness beacon.
    pub fn heartbeat(&self) -> String {
        format!("{}/heartbeat", self.prefix)
    }

    /// Connectivity of probe `index` (1-based).
    pub fn probe_connected(&self, index: u8) -> String {
        format!("{}/probe/{}/connected", self.prefix, index)
    }

    /// Temperature of probe `index` (1-based).
    pub fn probe_temperature(&self, index: u8) -> String {
        format!("{}/probe/{}/temperature", self.prefix, index)
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_PREFIX)
    }
}
