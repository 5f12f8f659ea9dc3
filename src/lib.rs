// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # smoker-mqtt-bridge
//!
//! Relays temperature readings from a BLE smoker thermometer to an MQTT
//! broker.
//!
//! The thermometer exposes a notify characteristic that pushes frames
//! carrying six probe readings. Each data frame is decoded and published as
//! per-probe connectivity and temperature topics. The bridge also reports
//! whether the thermometer itself is connected and sends a periodic
//! heartbeat, reconnecting both sides forever on failure.
//!
//! ## Topics
//!
//! With the default `smoker` prefix:
//!
//! | Topic | Payload |
//! |-------|---------|
//! | `smoker/bt-connected` | `true` / `false` |
//! | `smoker/heartbeat` | empty |
//! | `smoker/probe/{1..6}/connected` | `true` / `false` |
//! | `smoker/probe/{1..6}/temperature` | degrees Fahrenheit, one decimal, or `0` |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smoker_mqtt_bridge::{Bridge, BridgeConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = BridgeConfig::new("iBBQ").with_broker("192.168.1.10", 1883);
//!
//!     // Runs until a background task fails
//!     Bridge::start(&config).await?.run().await
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### macOS
//! Requires Bluetooth permission for the terminal or bundled app.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data types

// Public modules
pub mod ble;
pub mod bridge;
pub mod config;
pub mod data;
pub mod error;
pub mod heartbeat;
pub mod lifecycle;
pub mod mqtt;
pub mod protocol;
pub mod publisher;
pub mod retry;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use bridge::Bridge;
pub use config::{BridgeConfig, Credentials, MqttConfig, RetryConfig};
pub use error::{Error, Result};
pub use utils::{celsius_to_fahrenheit, tenths_celsius_to_fahrenheit};

// Re-export commonly used types from submodules
pub use ble::{BleSession, BleTransport, PlatformTransport};
pub use data::{BridgeState, ProbeReading, PROBE_COUNT};
pub use heartbeat::Heartbeat;
pub use lifecycle::{BleLifecycle, LifecyclePhase};
pub use mqtt::{MqttPublisher, Publish, SessionManager, Topics};
pub use publisher::ProbePublisher;
