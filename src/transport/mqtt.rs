//! MQTT transport built on `rumqttc`.
//!
//! Speaks real MQTT to the broker, over WebSockets (`ws://`, `wss://`) or
//! plain TCP (`mqtt://`, `tcp://`). Subscriptions are forwarded to the
//! broker. rumqttc's own reconnect loop is not used: the first event loop
//! error closes the link and the connection manager decides what to do.

use std::time::Duration;

use arcstr::ArcStr;
use futures::FutureExt;
use futures::future::BoxFuture;
use rumqttc::Packet::{self, Disconnect, Publish};
use rumqttc::{
	AsyncClient, ConnAck, ConnectReturnCode, EventLoop, MqttOptions, QoS,
	Transport,
};
use rumqttc::{Event::Incoming, Event::Outgoing};
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::{debug, error, info, warn};

use super::{Connector, Link, LinkCommand, LinkEvent, TransportError};

/// Settings shared by every link opened by an [`MqttConnector`].
#[derive(Debug, Clone)]
pub struct MqttTransportSettings {
	/// Client identifier presented to the broker
	pub client_id: String,
	/// QoS used for publish and subscribe
	pub qos: QoS,
	/// MQTT keep alive interval
	pub keep_alive: Duration,
	/// Capacity of rumqttc's request channel
	pub event_loop_capacity: usize,
	/// Capacity of the link channels
	pub channel_capacity: usize,
}

impl Default for MqttTransportSettings {
	fn default() -> Self {
		Self {
			client_id: generate_client_id("smartdoor_webapp"),
			qos: QoS::AtMostOnce,
			keep_alive: Duration::from_secs(30),
			event_loop_capacity: 10,
			channel_capacity: 100,
		}
	}
}

/// Builds a client id from `prefix` and 8 random hex digits.
pub fn generate_client_id(prefix: &str) -> String {
	let uuid = uuid::Uuid::new_v4().simple().to_string();
	format!("{prefix}_{}", &uuid[.. 8])
}

/// Connector for MQTT brokers.
#[derive(Debug, Clone, Default)]
pub struct MqttConnector {
	settings: MqttTransportSettings,
}

impl MqttConnector {
	/// Creates a connector with the given settings.
	pub fn new(settings: MqttTransportSettings) -> Self {
		Self { settings }
	}

	/// Returns the settings used for new links.
	pub fn settings(&self) -> &MqttTransportSettings {
		&self.settings
	}
}

impl Connector for MqttConnector {
	fn open(
		&self,
		endpoint: ArcStr,
	) -> BoxFuture<'static, Result<Link, TransportError>> {
		let settings = self.settings.clone();
		async move {
			let options = mqtt_options(&endpoint, &settings)?;
			let (client, event_loop) =
				AsyncClient::new(options, settings.event_loop_capacity);
			let event_loop = establish_connection(event_loop).await?;
			debug!(endpoint = %endpoint, client_id = %settings.client_id, "MQTT session established");

			let (link, command_rx, event_tx) =
				Link::channel(settings.channel_capacity);
			tokio::spawn(run_event_loop(endpoint.clone(), event_loop, event_tx));
			tokio::spawn(run_commands(client, settings.qos, command_rx));
			Ok(link)
		}
		.boxed()
	}
}

/// Endpoint URL split into the parts rumqttc needs.
#[derive(Debug, PartialEq, Eq)]
struct ParsedEndpoint<'a> {
	scheme: &'a str,
	host: &'a str,
	port: u16,
}

fn parse_endpoint(endpoint: &str) -> Result<ParsedEndpoint<'_>, TransportError> {
	let unsupported = |reason: &str| TransportError::UnsupportedEndpoint {
		endpoint: endpoint.to_string(),
		reason: reason.to_string(),
	};
	let (scheme, rest) = endpoint
		.split_once("://")
		.ok_or_else(|| unsupported("missing scheme"))?;
	let default_port = match scheme {
		| "mqtt" | "tcp" => 1883,
		| "ws" => 80,
		| "wss" => 443,
		| _ => return Err(unsupported("expected mqtt://, tcp://, ws:// or wss://")),
	};
	let authority = rest.split(['/', '?']).next().unwrap_or_default();
	let (host, port) = match authority.rsplit_once(':') {
		| Some((host, port)) => (
			host,
			port.parse::<u16>().map_err(|_| unsupported("invalid port"))?,
		),
		| None => (authority, default_port),
	};
	if host.is_empty() {
		return Err(unsupported("missing host"));
	}
	Ok(ParsedEndpoint { scheme, host, port })
}

fn mqtt_options(
	endpoint: &str,
	settings: &MqttTransportSettings,
) -> Result<MqttOptions, TransportError> {
	let parsed = parse_endpoint(endpoint)?;
	let mut options = match parsed.scheme {
		// WebSocket transports take the whole URL as broker address
		| "ws" => {
			let mut options =
				MqttOptions::new(&settings.client_id, endpoint, parsed.port);
			options.set_transport(Transport::Ws);
			options
		}
		| "wss" => {
			let mut options =
				MqttOptions::new(&settings.client_id, endpoint, parsed.port);
			options.set_transport(Transport::wss_with_default_config());
			options
		}
		| _ => MqttOptions::new(&settings.client_id, parsed.host, parsed.port),
	};
	options.set_keep_alive(settings.keep_alive);
	options.set_clean_session(true);
	Ok(options)
}

async fn establish_connection(
	mut event_loop: EventLoop,
) -> Result<EventLoop, TransportError> {
	loop {
		match event_loop.poll().await {
			| Ok(Incoming(Packet::ConnAck(ConnAck { code, .. }))) => {
				if code == ConnectReturnCode::Success {
					return Ok(event_loop);
				}
				debug!(code = ?code, "MQTT connection rejected by broker");
				return Err(TransportError::BrokerRejected { code });
			}
			| Ok(notification) => {
				debug!(notification = ?notification, "Bootstrap phase notification");
			}
			| Err(connection_err) => {
				debug!(error = %connection_err, "MQTT connection error during bootstrap phase");
				return Err(TransportError::Mqtt(connection_err));
			}
		}
	}
}

/// Forwards broker traffic to the link until the session ends.
async fn run_event_loop(
	endpoint: ArcStr,
	mut event_loop: EventLoop,
	event_tx: Sender<LinkEvent>,
) {
	let reason = loop {
		match event_loop.poll().await {
			| Ok(Incoming(Publish(p))) => {
				debug!(topic = %p.topic, payload_size = p.payload.len(), "Received MQTT message");
				let event = LinkEvent::Message {
					topic: p.topic,
					payload: p.payload,
				};
				if event_tx.send(event).await.is_err() {
					debug!("Link receiver dropped, stopping event loop");
					return;
				}
			}
			| Ok(Incoming(Disconnect)) => {
				break Some("broker sent DISCONNECT".to_string());
			}
			| Ok(Outgoing(rumqttc::Outgoing::Disconnect)) => {
				info!(endpoint = %endpoint, "Sent MQTT Disconnect packet to server");
				return;
			}
			| Ok(_) => {}
			| Err(err) => {
				error!(endpoint = %endpoint, error = %err, "MQTT event loop error");
				break Some(err.to_string());
			}
		}
	};
	let _ = event_tx.send(LinkEvent::Closed { reason }).await;
}

/// Applies link commands to the rumqttc client until the link is dropped.
async fn run_commands(
	client: AsyncClient,
	qos: QoS,
	mut command_rx: Receiver<LinkCommand>,
) {
	while let Some(command) = command_rx.recv().await {
		let res = match command {
			| LinkCommand::Publish { topic, payload } => {
				client.publish(topic.as_str(), qos, false, payload).await
			}
			| LinkCommand::Subscribe(pattern) => {
				client.subscribe(pattern.as_str(), qos).await
			}
			| LinkCommand::Unsubscribe(pattern) => {
				client.unsubscribe(pattern.as_str()).await
			}
			| LinkCommand::Close => break,
		};
		if let Err(err) = res {
			warn!(error = %err, "MQTT client request failed");
		}
	}
	if let Err(err) = client.disconnect().await {
		debug!(error = %err, "MQTT disconnect request not delivered");
	}
}
