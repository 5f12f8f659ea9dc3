//! MQTT side of the bridge.
//!
//! Topic naming, the publish capability and the session manager that keeps
//! the broker connection alive.

pub mod client;
pub mod session;
pub mod topics;

pub use client::{connect, MqttPublisher, Publish};
pub use session::{SessionEvent, SessionEvents, SessionManager};
pub use topics::Topics;
