//! # Smart Door MQTT
//!
//! MQTT client for the smart door-lock admin console: one reconnecting
//! connection to the broker, wildcard subscriptions dispatched to ordered
//! callbacks, and fire-and-forget publishing.
//!
//! ## Features
//!
//! - **Endpoint fallback**: endpoints are tried in order, each with its own timeout
//! - **Reconnect with backoff**: unexpected disconnects retry with a doubling, capped delay
//! - **Pattern-based Routing**: MQTT wildcard patterns (`+`, `#`)
//! - **Ordered, isolated callbacks**: a failing callback never stops the others
//! - **Pluggable transports**: JSON-over-WebSocket bridge, MQTT (via `rumqttc`), in-memory
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smartdoor_mqtt::devices::{DeviceStatus, DoorCommand, door_control_topic};
//! use smartdoor_mqtt::{MqttClient, MqttClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (client, connection) = MqttClient::from_config(MqttClientConfig::from_env()?);
//!     client.connect().await?;
//!
//!     client
//!         .subscribe("doorlock/+/status/+", |message| {
//!             if let Some(status) = DeviceStatus::from_message(message) {
//!                 println!("{status:?}");
//!             }
//!             Ok(())
//!         })
//!         .await?;
//!
//!     let sent = client
//!         .publish_json(door_control_topic("D01"), &DoorCommand::unlock())
//!         .await;
//!     println!("unlock sent: {sent}");
//!
//!     client.disconnect().await;
//!     connection.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Pattern Matching
//!
//! - `+` matches exactly one topic level (e.g., `doorlock/+/status/door`)
//! - `#` as the last level matches zero or more levels, so `alarms/#`
//!   matches `alarms` as well as `alarms/fire/zone1`

#![warn(missing_docs)]

// Core modules
pub mod client;
pub mod connection;
pub mod devices;
pub mod payload;
pub mod routing;
pub mod topic;
pub mod transport;
pub mod wire;

// === Core Public API ===
// Main client types
pub use client::{MqttClient, MqttClientConfig, MqttClientError};
pub use connection::{ConnectionError, ConnectionState, MqttConnection};

// Messages
pub use payload::{InboundMessage, OutboundPayload, Payload};

// Essential external types
pub use rumqttc::QoS;

// === Advanced API ===
pub use client::{ClientSettings, MqttPublisher, TransportKind};
pub use connection::ReconnectPolicy;
pub use routing::{HandlerResult, MessageHandler, MqttSubscriber};

// Topic pattern types (for manual pattern handling)
pub use topic::{SubscriptionId, TopicPatternError, TopicPatternPath};

/// Result type alias for operations that may fail with MqttClientError
pub type Result<T> = std::result::Result<T, MqttClientError>;

/// Prelude module for convenient imports
///
/// ```rust
/// use smartdoor_mqtt::prelude::*;
/// ```
pub mod prelude {
	//! Essential types for most applications

	pub use crate::{
		ConnectionState, InboundMessage, MqttClient, MqttClientConfig,
		MqttClientError, MqttConnection, Payload, Result, SubscriptionId,
	};
}

/// Error types used throughout the library
///
/// ```rust
/// use smartdoor_mqtt::errors::*;
/// ```
pub mod errors {
	//! All error types used in the library

	pub use crate::client::MqttClientError;
	pub use crate::connection::{ConnectionError, EndpointFailure};
	pub use crate::routing::{HandlerError, SubscriptionError};
	pub use crate::topic::{
		TopicMatcherError, TopicPatternError, TopicRouterError,
	};
	pub use crate::transport::TransportError;
	pub use crate::wire::WireError;
}
