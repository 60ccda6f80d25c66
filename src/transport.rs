//! Transport layer
//!
//! A [`Connector`] opens one socket to one endpoint and hands back a
//! [`Link`]: a pair of channels the connection manager uses to talk to the
//! task that owns the socket. Dropping the link's outbound sender closes
//! the socket; the socket closing on its own surfaces as
//! [`LinkEvent::Closed`] or as the inbound channel ending.

pub mod envelope;
pub mod memory;
pub mod mqtt;

use arcstr::ArcStr;
use bytes::Bytes;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::mpsc;

pub use envelope::EnvelopeConnector;
pub use memory::{MemoryConnector, MemoryPeer};
pub use mqtt::MqttConnector;

/// Errors raised while opening a link
#[derive(Debug, Error)]
pub enum TransportError {
	/// WebSocket handshake or I/O failure
	#[error("WebSocket error: {0}")]
	WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

	/// MQTT network failure before the broker acknowledged the connection
	#[error("MQTT connection failed: {0}")]
	Mqtt(#[from] rumqttc::ConnectionError),

	/// Broker answered CONNECT with a failure code
	#[error("Broker rejected connection: {code:?}")]
	BrokerRejected {
		/// Return code sent by the broker
		code: rumqttc::ConnectReturnCode,
	},

	/// Endpoint URL scheme is not served by this connector
	#[error("Unsupported endpoint '{endpoint}': {reason}")]
	UnsupportedEndpoint {
		/// Rejected endpoint
		endpoint: String,
		/// Why it was rejected
		reason: String,
	},

	/// Endpoint refused the connection
	#[error("Connection refused: {0}")]
	Refused(String),
}

/// Commands sent from the connection manager to the socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
	/// Send a message
	Publish {
		/// Concrete topic
		topic: ArcStr,
		/// Serialized payload text
		payload: String,
	},
	/// Ask the broker to route a pattern to this client
	Subscribe(ArcStr),
	/// Withdraw a pattern from the broker
	Unsubscribe(ArcStr),
	/// Close the socket gracefully
	Close,
}

/// Events sent from the socket task to the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
	/// Inbound message
	Message {
		/// Concrete topic
		topic: String,
		/// Payload bytes as received
		payload: Bytes,
	},
	/// Socket closed without being asked to
	Closed {
		/// Reason reported by the transport, if any
		reason: Option<String>,
	},
}

/// Open socket as seen by the connection manager.
#[derive(Debug)]
pub struct Link {
	/// Commands for the socket task
	pub outbound: mpsc::Sender<LinkCommand>,
	/// Events from the socket task
	pub inbound: mpsc::Receiver<LinkEvent>,
}

impl Link {
	/// Creates a connected pair of channels.
	///
	/// Returns the manager's side and the socket task's side.
	pub fn channel(
		capacity: usize,
	) -> (Self, mpsc::Receiver<LinkCommand>, mpsc::Sender<LinkEvent>) {
		let (command_tx, command_rx) = mpsc::channel(capacity);
		let (event_tx, event_rx) = mpsc::channel(capacity);
		(
			Self {
				outbound: command_tx,
				inbound: event_rx,
			},
			command_rx,
			event_tx,
		)
	}
}

/// Opens links to broker endpoints.
pub trait Connector: Send + Sync + 'static {
	/// Opens a socket to `endpoint`.
	///
	/// The future resolves once the endpoint is ready to carry messages.
	/// The caller applies its own timeout and drops the future to abort.
	fn open(
		&self,
		endpoint: ArcStr,
	) -> BoxFuture<'static, Result<Link, TransportError>>;
}
