use std::sync::Arc;

use arcstr::ArcStr;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::warn;

use super::config::MqttClientConfig;
use super::error::MqttClientError;
use super::publisher::MqttPublisher;
use crate::connection::{
	ConnectionError, ConnectionManagerActor, ConnectionManagerHandler,
	ConnectionState, MqttConnection,
};
use crate::payload::{InboundMessage, OutboundPayload};
use crate::routing::{
	HandlerResult, MessageHandler, MqttSubscriber, SubscriptionError,
};
use crate::topic::validation::validate_publish_topic;
use crate::topic::{SubscriptionId, TopicPatternPath, TopicRouterError};
use crate::transport::Connector;

/// Handle used by application code to talk to the broker.
///
/// Cheap to clone; every clone drives the same connection manager. The
/// manager lives until [`MqttConnection::shutdown`] is called.
#[derive(Debug, Clone)]
pub struct MqttClient {
	manager: ConnectionManagerHandler,
}

impl MqttClient {
	/// Starts a connection manager using `connector` to open links.
	///
	/// Nothing is opened until [`connect`](Self::connect) is called. Must be
	/// called from within a tokio runtime.
	pub fn new(
		config: MqttClientConfig,
		connector: Arc<dyn Connector>,
	) -> (Self, MqttConnection) {
		let (controller, manager) =
			ConnectionManagerActor::spawn(&config, connector);
		(Self { manager }, MqttConnection::new(controller))
	}

	/// Starts a connection manager with the connector selected by
	/// `config.transport`.
	pub fn from_config(config: MqttClientConfig) -> (Self, MqttConnection) {
		let connector = config.connector();
		Self::new(config, connector)
	}

	/// Connects to the first endpoint that accepts.
	///
	/// Resolves immediately when already connected and joins an attempt
	/// that is already in flight instead of opening another socket.
	pub async fn connect(&self) -> Result<(), ConnectionError> {
		self.manager.connect().await
	}

	/// Closes the link, cancels pending reconnects and drops every
	/// subscription. Safe to call in any state.
	pub async fn disconnect(&self) {
		if !self.manager.disconnect().await {
			warn!("disconnect() called after the connection manager stopped");
		}
	}

	pub fn state(&self) -> ConnectionState {
		self.manager.state()
	}

	/// Receiver that observes every state transition.
	pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
		self.manager.watch_state()
	}

	pub fn is_connected(&self) -> bool {
		self.state().is_connected()
	}

	/// Registers `callback` for messages matching `pattern`.
	///
	/// Callbacks under the same pattern run in registration order. May be
	/// called while disconnected; the pattern reaches the broker once a link
	/// is up.
	pub async fn subscribe<F>(
		&self,
		pattern: impl Into<ArcStr>,
		callback: F,
	) -> Result<SubscriptionId, MqttClientError>
	where
		F: Fn(&InboundMessage) -> HandlerResult + Send + Sync + 'static,
	{
		self.subscribe_handler(pattern, Arc::new(callback)).await
	}

	/// Same as [`subscribe`](Self::subscribe) for an existing handler.
	pub async fn subscribe_handler(
		&self,
		pattern: impl Into<ArcStr>,
		handler: MessageHandler,
	) -> Result<SubscriptionId, MqttClientError> {
		let pattern = TopicPatternPath::new(pattern)?;
		self.manager
			.subscribe(pattern, handler)
			.await
			.ok_or(SubscriptionError::ChannelClosed.into())
	}

	/// Subscribes with a queue instead of a callback.
	pub async fn subscribe_channel(
		&self,
		pattern: impl Into<ArcStr>,
	) -> Result<MqttSubscriber, MqttClientError> {
		let pattern = TopicPatternPath::new(pattern)?;
		let (tx, rx) = mpsc::channel(self.manager.subscriber_queue_capacity());
		let id = self
			.manager
			.subscribe(pattern.clone(), MqttSubscriber::forwarder(tx))
			.await
			.ok_or(SubscriptionError::ChannelClosed)?;
		Ok(MqttSubscriber::new(
			rx,
			self.manager.unsubscribe_sender(),
			pattern,
			id,
		))
	}

	/// Removes the callback `id` from `pattern`, or every callback of
	/// `pattern` when `id` is `None`.
	///
	/// Returns the number of callbacks removed.
	pub async fn unsubscribe(
		&self,
		pattern: impl Into<ArcStr>,
		id: Option<SubscriptionId>,
	) -> Result<usize, MqttClientError> {
		let pattern = TopicPatternPath::new(pattern)?;
		let removed = self
			.manager
			.unsubscribe(pattern, id)
			.await
			.ok_or(SubscriptionError::ChannelClosed)?
			.map_err(SubscriptionError::from)?;
		Ok(removed)
	}

	/// Sends a message.
	///
	/// Returns false, after logging why, when not connected or when the
	/// link refused the message. Nothing is queued for later.
	pub async fn publish(
		&self,
		topic: impl Into<ArcStr>,
		payload: impl Into<OutboundPayload>,
	) -> bool {
		self.manager
			.publish(topic.into(), payload.into().into_text())
			.await
	}

	/// Serializes `value` as JSON and sends it.
	pub async fn publish_json<T>(&self, topic: impl Into<ArcStr>, value: &T) -> bool
	where T: Serialize + ?Sized {
		match OutboundPayload::json(value) {
			| Ok(payload) => self.publish(topic, payload).await,
			| Err(err) => {
				warn!(error = %err, "Publish dropped, payload not serializable");
				false
			}
		}
	}

	/// Typed publisher bound to one concrete topic.
	pub fn publisher<T>(
		&self,
		topic: impl Into<ArcStr>,
	) -> Result<MqttPublisher<T>, TopicRouterError>
	where T: Serialize {
		let topic = topic.into();
		validate_publish_topic(&topic)?;
		Ok(MqttPublisher::new(self.clone(), topic))
	}
}
