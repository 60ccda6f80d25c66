//! MQTT client module
//!
//! This module provides the application-facing client: connection control,
//! callback and channel subscriptions, and publishing.

/// Asynchronous MQTT client implementation
pub mod async_client;
pub mod config;
/// Client error types
pub mod error;
/// Typed JSON publishers
pub mod publisher;

// Re-export commonly used types for convenience
pub use async_client::MqttClient;
pub use config::{ClientSettings, MqttClientConfig, TransportKind};
pub use error::MqttClientError;
pub use publisher::MqttPublisher;

// Connection type is available from the root level
// Use: smartdoor_mqtt::MqttConnection
