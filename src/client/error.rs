use std::convert::Infallible;

use tokio::task::JoinError;

use crate::connection::ConnectionError;
use crate::routing::SubscriptionError;
use crate::topic::{TopicPatternError, TopicRouterError};

/// Errors that can occur in MQTT client operations
#[derive(Debug, thiserror::Error)]
pub enum MqttClientError {
	/// Connecting to the broker failed
	#[error("Connection error: {0}")]
	Connection(#[from] ConnectionError),

	/// Invalid configuration parameter values
	#[error("Invalid configuration value: {0}")]
	ConfigurationValue(String),

	/// Serialization errors when converting data to a payload
	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// Subscription management errors
	#[error("Subscription error: {0}")]
	Subscription(#[from] SubscriptionError),

	/// Invalid topic pattern errors
	#[error("Topic pattern error: {0}")]
	TopicPattern(#[from] TopicPatternError),

	/// Topic routing errors
	#[error("Topic routing error: {0}")]
	TopicRouting(#[from] TopicRouterError),

	/// Background task ended abnormally
	#[error("Background task failed: {0}")]
	Task(#[from] JoinError),
}

impl From<Infallible> for MqttClientError {
	fn from(err: Infallible) -> Self {
		match err {}
	}
}
