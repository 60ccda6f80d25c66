//! Configuration for MQTT client initialization

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use arcstr::ArcStr;

use super::error::MqttClientError;
use crate::connection::ReconnectPolicy;
use crate::transport::mqtt::{MqttTransportSettings, generate_client_id};
use crate::transport::{Connector, EnvelopeConnector, MqttConnector};

/// Endpoint used when nothing else is configured
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:9001";

/// Wire protocol spoken to the endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
	/// WebSocket carrying `{topic, payload}` JSON envelopes
	#[default]
	Envelope,
	/// MQTT over WebSocket or TCP
	Mqtt,
}

impl FromStr for TransportKind {
	type Err = MqttClientError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			| "envelope" | "ws" | "json" => Ok(TransportKind::Envelope),
			| "mqtt" => Ok(TransportKind::Mqtt),
			| other => Err(MqttClientError::ConfigurationValue(format!(
				"unknown transport '{other}', expected 'envelope' or 'mqtt'"
			))),
		}
	}
}

/// Client-level performance and behavior settings
#[derive(Debug, Clone)]
pub struct ClientSettings {
	/// Time one endpoint gets to accept the connection
	pub connect_timeout: Duration,
	/// Size of the topic path cache (must be > 0)
	pub topic_cache_size: usize,
	/// Capacity of the command channel for the connection manager
	pub command_channel_capacity: usize,
	/// Capacity of the unsubscribe channel
	pub unsubscribe_channel_capacity: usize,
	/// Queue length of each channel subscriber
	pub subscriber_queue_capacity: usize,
}

impl Default for ClientSettings {
	fn default() -> Self {
		Self {
			connect_timeout: Duration::from_secs(5),
			topic_cache_size: 100,
			command_channel_capacity: 100,
			unsubscribe_channel_capacity: 10,
			subscriber_queue_capacity: 100,
		}
	}
}

/// Configuration for MQTT client creation
#[derive(Debug, Clone)]
pub struct MqttClientConfig {
	/// Endpoints tried in order on every connection attempt
	pub endpoints: Vec<ArcStr>,
	/// Wire protocol
	pub transport: TransportKind,
	/// Client-level performance and behavior settings
	pub settings: ClientSettings,
	/// Backoff after unexpected disconnects
	pub reconnect: ReconnectPolicy,
	/// Options used by the MQTT transport
	pub mqtt: MqttTransportSettings,
}

impl Default for MqttClientConfig {
	fn default() -> Self {
		Self {
			endpoints: vec![ArcStr::from(DEFAULT_ENDPOINT)],
			transport: TransportKind::default(),
			settings: ClientSettings::default(),
			reconnect: ReconnectPolicy::default(),
			mqtt: MqttTransportSettings::default(),
		}
	}
}

impl MqttClientConfig {
	/// Create new config for the given endpoints, tried in order
	///
	/// # Example
	/// ```rust
	/// use smartdoor_mqtt::MqttClientConfig;
	///
	/// let config = MqttClientConfig::new(["ws://localhost:9001", "ws://127.0.0.1:9001"]);
	/// assert_eq!(config.endpoints.len(), 2);
	/// ```
	pub fn new<I, S>(endpoints: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<ArcStr>,
	{
		Self {
			endpoints: endpoints.into_iter().map(Into::into).collect(),
			..Self::default()
		}
	}

	/// Reads the configuration from the environment
	///
	/// `.env` is loaded first when present. Recognized variables:
	/// - `MQTT_ENDPOINTS`: comma separated endpoint list
	/// - `MQTT_TRANSPORT`: `envelope` or `mqtt`
	/// - `MQTT_CLIENT_ID`: MQTT client identifier
	/// - `MQTT_CONNECT_TIMEOUT_MS`: per-endpoint timeout
	/// - `MQTT_RECONNECT_MAX_ATTEMPTS`: retry cap after a disconnect
	pub fn from_env() -> Result<Self, MqttClientError> {
		dotenv::dotenv().ok();
		Self::from_lookup(|key| env::var(key).ok())
	}

	pub(crate) fn from_lookup(
		lookup: impl Fn(&str) -> Option<String>,
	) -> Result<Self, MqttClientError> {
		let mut config = Self::default();
		if let Some(endpoints) = lookup("MQTT_ENDPOINTS") {
			config.endpoints = endpoints
				.split(',')
				.map(str::trim)
				.filter(|e| !e.is_empty())
				.map(ArcStr::from)
				.collect();
			if config.endpoints.is_empty() {
				return Err(MqttClientError::ConfigurationValue(
					"MQTT_ENDPOINTS lists no endpoint".to_string(),
				));
			}
		}
		if let Some(transport) = lookup("MQTT_TRANSPORT") {
			config.transport = transport.parse()?;
		}
		if let Some(client_id) = lookup("MQTT_CLIENT_ID") {
			config.mqtt.client_id = client_id;
		}
		if let Some(timeout) = lookup("MQTT_CONNECT_TIMEOUT_MS") {
			let millis = parse_number::<u64>("MQTT_CONNECT_TIMEOUT_MS", &timeout)?;
			if millis == 0 {
				return Err(MqttClientError::ConfigurationValue(
					"MQTT_CONNECT_TIMEOUT_MS must be greater than 0".to_string(),
				));
			}
			config.settings.connect_timeout = Duration::from_millis(millis);
		}
		if let Some(attempts) = lookup("MQTT_RECONNECT_MAX_ATTEMPTS") {
			config.reconnect.max_attempts =
				parse_number("MQTT_RECONNECT_MAX_ATTEMPTS", &attempts)?;
		}
		Ok(config)
	}

	pub fn with_transport(mut self, transport: TransportKind) -> Self {
		self.transport = transport;
		self
	}

	pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.settings.connect_timeout = timeout;
		self
	}

	pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
		self.reconnect = reconnect;
		self
	}

	pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
		self.mqtt.client_id = client_id.into();
		self
	}

	/// Replaces the client id with a fresh `<prefix>_<8 hex>` id
	pub fn with_client_id_prefix(mut self, prefix: &str) -> Self {
		self.mqtt.client_id = generate_client_id(prefix);
		self
	}

	/// Builds the connector matching [`transport`](Self::transport)
	pub fn connector(&self) -> Arc<dyn Connector> {
		match self.transport {
			| TransportKind::Envelope => Arc::new(EnvelopeConnector::new(
				self.settings.command_channel_capacity.max(1),
			)),
			| TransportKind::Mqtt => {
				Arc::new(MqttConnector::new(self.mqtt.clone()))
			}
		}
	}
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, MqttClientError> {
	value.trim().parse().map_err(|_| {
		MqttClientError::ConfigurationValue(format!(
			"{key} must be a non-negative integer, got '{value}'"
		))
	})
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	fn from_vars(
		vars: &[(&str, &str)],
	) -> Result<MqttClientConfig, MqttClientError> {
		let vars: HashMap<String, String> = vars
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		MqttClientConfig::from_lookup(|key| vars.get(key).cloned())
	}

	#[test]
	fn test_defaults() {
		let config = from_vars(&[]).unwrap();
		assert_eq!(config.endpoints, vec![ArcStr::from(DEFAULT_ENDPOINT)]);
		assert_eq!(config.transport, TransportKind::Envelope);
		assert_eq!(config.settings.connect_timeout, Duration::from_secs(5));
		assert_eq!(config.reconnect, ReconnectPolicy::default());
		assert!(config.mqtt.client_id.starts_with("smartdoor_webapp_"));
	}

	#[test]
	fn test_reads_all_variables() {
		let config = from_vars(&[
			("MQTT_ENDPOINTS", "ws://a:9001/mqtt, ws://b:9001/mqtt,"),
			("MQTT_TRANSPORT", "MQTT"),
			("MQTT_CLIENT_ID", "console-1"),
			("MQTT_CONNECT_TIMEOUT_MS", "1500"),
			("MQTT_RECONNECT_MAX_ATTEMPTS", "3"),
		])
		.unwrap();
		assert_eq!(config.endpoints, vec![
			ArcStr::from("ws://a:9001/mqtt"),
			ArcStr::from("ws://b:9001/mqtt")
		]);
		assert_eq!(config.transport, TransportKind::Mqtt);
		assert_eq!(config.mqtt.client_id, "console-1");
		assert_eq!(config.settings.connect_timeout, Duration::from_millis(1500));
		assert_eq!(config.reconnect.max_attempts, 3);
	}

	#[test]
	fn test_rejects_bad_values() {
		for vars in [
			[("MQTT_TRANSPORT", "carrier-pigeon")],
			[("MQTT_CONNECT_TIMEOUT_MS", "soon")],
			[("MQTT_CONNECT_TIMEOUT_MS", "0")],
			[("MQTT_RECONNECT_MAX_ATTEMPTS", "-1")],
			[("MQTT_ENDPOINTS", " , ")],
		] {
			let res = from_vars(&vars);
			assert!(
				matches!(res, Err(MqttClientError::ConfigurationValue(_))),
				"{vars:?} should be rejected"
			);
		}
	}
}
