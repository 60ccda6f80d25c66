#![allow(clippy::missing_docs_in_private_items)]
#![allow(missing_docs)]
use std::future::pending;
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use arcstr::ArcStr;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc::{Receiver, Sender, channel};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};

use super::error::{ConnectionError, EndpointFailure};
use super::reconnect::ReconnectPolicy;
use super::state::ConnectionState;
use crate::client::config::MqttClientConfig;
use crate::payload::InboundMessage;
use crate::routing::{Dispatcher, MessageHandler};
use crate::topic::validation::validate_publish_topic;
use crate::topic::{SubscriptionId, TopicPatternPath, TopicRouterError};
use crate::transport::{Connector, Link, LinkCommand, LinkEvent};

type ConnectReply = oneshot::Sender<Result<(), ConnectionError>>;
type Attempt = BoxFuture<'static, Result<Link, ConnectionError>>;

pub enum Command {
	Connect(ConnectReply),
	Disconnect(oneshot::Sender<()>),
	Subscribe {
		pattern: TopicPatternPath,
		handler: MessageHandler,
		reply: oneshot::Sender<SubscriptionId>,
	},
	Unsubscribe {
		pattern: TopicPatternPath,
		id: Option<SubscriptionId>,
		reply: oneshot::Sender<Result<usize, TopicRouterError>>,
	},
	Publish {
		topic: ArcStr,
		payload: String,
		reply: oneshot::Sender<bool>,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptKind {
	/// Started by `connect()`; failure is final
	Explicit,
	/// Started by the reconnect timer; failure schedules the next retry
	Background,
}

/// Task owning the link, the subscription registry and the reconnect
/// timer. Every command and event is handled to completion before the
/// next one, which keeps the state transitions free of races.
pub struct ConnectionManagerActor {
	endpoints: Arc<[ArcStr]>,
	connect_timeout: Duration,
	policy: ReconnectPolicy,
	connector: Arc<dyn Connector>,
	dispatcher: Dispatcher,
	state_tx: watch::Sender<ConnectionState>,
	command_rx: Receiver<Command>,
	unsubscribe_rx: Receiver<SubscriptionId>,
	shutdown_rx: oneshot::Receiver<()>,
	link: Option<Link>,
	attempt: Option<(AttemptKind, Attempt)>,
	waiters: Vec<ConnectReply>,
	reconnect_timer: Option<Pin<Box<Sleep>>>,
	reconnect_attempts: u32,
}

impl ConnectionManagerActor {
	pub fn spawn(
		config: &MqttClientConfig,
		connector: Arc<dyn Connector>,
	) -> (ConnectionManagerController, ConnectionManagerHandler) {
		let settings = &config.settings;
		let (command_tx, command_rx) =
			channel(settings.command_channel_capacity.max(1));
		let (unsubscribe_tx, unsubscribe_rx) =
			channel(settings.unsubscribe_channel_capacity.max(1));
		let (shutdown_tx, shutdown_rx) = oneshot::channel();
		let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
		let cache_size = NonZeroUsize::new(settings.topic_cache_size)
			.unwrap_or(NonZeroUsize::MIN);

		let actor = Self {
			endpoints: config.endpoints.iter().cloned().collect(),
			connect_timeout: settings.connect_timeout,
			policy: config.reconnect,
			connector,
			dispatcher: Dispatcher::new(cache_size),
			state_tx,
			command_rx,
			unsubscribe_rx,
			shutdown_rx,
			link: None,
			attempt: None,
			waiters: Vec::new(),
			reconnect_timer: None,
			reconnect_attempts: 0,
		};
		let join_handle = tokio::spawn(async move { actor.run().await });

		let controller = ConnectionManagerController {
			shutdown_tx,
			join_handle,
		};
		let handler = ConnectionManagerHandler {
			command_tx,
			unsubscribe_tx,
			state_rx,
			subscriber_queue_capacity: settings.subscriber_queue_capacity.max(1),
		};
		(controller, handler)
	}

	async fn run(mut self) {
		loop {
			tokio::select! {
				_ = &mut self.shutdown_rx => {
					info!("ConnectionManagerActor: Shutdown signal received");
					break;
				}
				cmd = self.command_rx.recv() => match cmd {
					| Some(cmd) => self.handle_command(cmd),
					| None => {
						info!("ConnectionManagerActor: Command channel closed, exiting");
						break;
					}
				},
				Some(id) = self.unsubscribe_rx.recv() => self.handle_unsubscribe_id(id),
				event = next_link_event(&mut self.link) => self.handle_link_event(event),
				result = next_attempt_result(&mut self.attempt) => {
					self.handle_attempt_result(result)
				}
				() = reconnect_timer_elapsed(&mut self.reconnect_timer) => {
					self.handle_reconnect_timer()
				}
			}
		}
		self.teardown();
		info!("ConnectionManagerActor: Exiting run loop");
	}

	fn handle_command(&mut self, cmd: Command) {
		match cmd {
			| Command::Connect(reply) => self.handle_connect(reply),
			| Command::Disconnect(reply) => {
				self.teardown();
				let _ = reply.send(());
			}
			| Command::Subscribe {
				pattern,
				handler,
				reply,
			} => {
				let id = self.handle_subscribe(pattern, handler);
				if reply.send(id).is_err() {
					warn!(subscription_id = %id, "Subscriber went away, removing callback");
					self.handle_unsubscribe_id(id);
				}
			}
			| Command::Unsubscribe { pattern, id, reply } => {
				let _ = reply.send(self.handle_unsubscribe(&pattern, id));
			}
			| Command::Publish {
				topic,
				payload,
				reply,
			} => {
				let _ = reply.send(self.handle_publish(topic, payload));
			}
		}
	}

	fn set_state(&mut self, state: ConnectionState) {
		let previous = self.state_tx.send_replace(state);
		if previous != state {
			info!(from = %previous, to = %state, "Connection state changed");
		}
	}

	fn state(&self) -> ConnectionState {
		*self.state_tx.borrow()
	}

	fn handle_connect(&mut self, reply: ConnectReply) {
		if self.link.is_some() {
			let _ = reply.send(Ok(()));
			return;
		}
		if let Some((kind, _)) = self.attempt.as_mut() {
			// Joining makes a background retry behave like an explicit one
			*kind = AttemptKind::Explicit;
			self.reconnect_attempts = 0;
			self.set_state(ConnectionState::Connecting);
			self.waiters.push(reply);
			return;
		}
		if self.endpoints.is_empty() {
			error!("connect() called without endpoints");
			self.set_state(ConnectionState::Failed);
			let _ = reply.send(Err(ConnectionError::NoEndpoints));
			return;
		}
		if self.reconnect_timer.take().is_some() {
			debug!("Pending reconnect cancelled by explicit connect");
		}
		self.reconnect_attempts = 0;
		self.waiters.push(reply);
		self.start_attempt(AttemptKind::Explicit);
	}

	fn start_attempt(&mut self, kind: AttemptKind) {
		self.set_state(match kind {
			| AttemptKind::Explicit => ConnectionState::Connecting,
			| AttemptKind::Background => ConnectionState::Reconnecting,
		});
		let attempt = try_endpoints(
			Arc::clone(&self.connector),
			Arc::clone(&self.endpoints),
			self.connect_timeout,
		)
		.boxed();
		self.attempt = Some((kind, attempt));
	}

	fn handle_attempt_result(
		&mut self,
		(kind, result): (AttemptKind, Result<Link, ConnectionError>),
	) {
		self.attempt = None;
		match result {
			| Ok(link) => {
				self.link = Some(link);
				self.reconnect_attempts = 0;
				self.set_state(ConnectionState::Connected);
				self.resubscribe();
				for waiter in self.waiters.drain(..) {
					let _ = waiter.send(Ok(()));
				}
			}
			| Err(err) => match kind {
				| AttemptKind::Explicit => {
					error!(error = %err, "Connection attempt failed");
					self.set_state(ConnectionState::Failed);
					for waiter in self.waiters.drain(..) {
						let _ = waiter.send(Err(err.clone()));
					}
				}
				| AttemptKind::Background => {
					warn!(
						attempt = self.reconnect_attempts,
						error = %err,
						"Reconnect attempt failed"
					);
					self.schedule_reconnect();
				}
			},
		}
	}

	/// Tells the broker about every pattern in the registry.
	fn resubscribe(&mut self) {
		let patterns = self.dispatcher.active_patterns();
		if !patterns.is_empty() {
			info!(count = patterns.len(), "Restoring subscriptions");
		}
		for pattern in patterns {
			self.send_link(LinkCommand::Subscribe(pattern));
		}
	}

	fn schedule_reconnect(&mut self) {
		self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
		let attempt = self.reconnect_attempts;
		if !self.policy.allows(attempt) {
			error!(
				max_attempts = self.policy.max_attempts,
				"Reconnect attempts exhausted, giving up"
			);
			self.set_state(ConnectionState::Failed);
			return;
		}
		let delay = self.policy.delay_for(attempt);
		info!(attempt, delay = ?delay, "Scheduling reconnect");
		self.set_state(ConnectionState::Reconnecting);
		self.reconnect_timer = Some(Box::pin(tokio::time::sleep(delay)));
	}

	fn handle_reconnect_timer(&mut self) {
		self.reconnect_timer = None;
		debug!(attempt = self.reconnect_attempts, "Reconnect timer fired");
		self.start_attempt(AttemptKind::Background);
	}

	fn handle_link_event(&mut self, event: Option<LinkEvent>) {
		match event {
			| Some(LinkEvent::Message { topic, payload }) => {
				let message = InboundMessage::new(topic, &payload);
				let report = self.dispatcher.dispatch(&message);
				debug!(
					topic = %message.topic,
					delivered = report.delivered,
					failed = report.failed,
					"Message dispatched"
				);
			}
			| Some(LinkEvent::Closed { reason }) => self.handle_link_lost(reason),
			| None => self.handle_link_lost(None),
		}
	}

	fn handle_link_lost(&mut self, reason: Option<String>) {
		self.link = None;
		warn!(reason = ?reason, "Connection lost unexpectedly");
		self.schedule_reconnect();
	}

	fn handle_subscribe(
		&mut self,
		pattern: TopicPatternPath,
		handler: MessageHandler,
	) -> SubscriptionId {
		let mqtt_pattern = pattern.mqtt_pattern();
		let (fresh, id) = self.dispatcher.subscribe(pattern, handler);
		if fresh {
			self.send_link(LinkCommand::Subscribe(mqtt_pattern));
		}
		id
	}

	fn handle_unsubscribe(
		&mut self,
		pattern: &TopicPatternPath,
		id: Option<SubscriptionId>,
	) -> Result<usize, TopicRouterError> {
		let (removed, emptied) = self.dispatcher.unsubscribe(pattern, id)?;
		if emptied {
			debug!(pattern = %pattern, "Topic pattern now empty");
			self.send_link(LinkCommand::Unsubscribe(pattern.mqtt_pattern()));
		}
		Ok(removed)
	}

	fn handle_unsubscribe_id(&mut self, id: SubscriptionId) {
		if let Some(pattern) = self.dispatcher.unsubscribe_id(id) {
			debug!(pattern = %pattern, "Topic pattern now empty");
			self.send_link(LinkCommand::Unsubscribe(pattern.mqtt_pattern()));
		}
	}

	fn handle_publish(&mut self, topic: ArcStr, payload: String) -> bool {
		if !self.state().is_connected() {
			warn!(topic = %topic, state = %self.state(), "Publish dropped, not connected");
			return false;
		}
		if let Err(err) = validate_publish_topic(&topic) {
			warn!(topic = %topic, error = %err, "Publish dropped, invalid topic");
			return false;
		}
		let Some(link) = self.link.as_ref() else {
			warn!(topic = %topic, "Publish dropped, no link");
			return false;
		};
		match link.outbound.try_send(LinkCommand::Publish {
			topic: topic.clone(),
			payload,
		}) {
			| Ok(()) => {
				debug!(topic = %topic, "Message published");
				true
			}
			| Err(err) => {
				warn!(topic = %topic, error = %err, "Publish failed");
				false
			}
		}
	}

	/// Forwards a command to the open link, if any.
	fn send_link(&self, command: LinkCommand) {
		if let Some(link) = self.link.as_ref() {
			if let Err(err) = link.outbound.try_send(command) {
				warn!(error = %err, "Failed to forward command to link");
			}
		}
	}

	/// Cancels every pending activity, closes the link and clears the
	/// registry. Safe to call in any state.
	fn teardown(&mut self) {
		if self.reconnect_timer.take().is_some() {
			debug!("Pending reconnect cancelled");
		}
		if self.attempt.take().is_some() {
			debug!("In-flight connection attempt cancelled");
		}
		for waiter in self.waiters.drain(..) {
			let _ = waiter.send(Err(ConnectionError::Aborted));
		}
		if self.link.is_some() {
			for pattern in self.dispatcher.active_patterns() {
				self.send_link(LinkCommand::Unsubscribe(pattern));
			}
			self.send_link(LinkCommand::Close);
			self.link = None;
		}
		self.dispatcher.clear();
		self.reconnect_attempts = 0;
		self.set_state(ConnectionState::Disconnected);
	}
}

async fn next_link_event(link: &mut Option<Link>) -> Option<LinkEvent> {
	match link {
		| Some(link) => link.inbound.recv().await,
		| None => pending().await,
	}
}

async fn next_attempt_result(
	attempt: &mut Option<(AttemptKind, Attempt)>,
) -> (AttemptKind, Result<Link, ConnectionError>) {
	match attempt {
		| Some((kind, fut)) => {
			let result = fut.await;
			(*kind, result)
		}
		| None => pending().await,
	}
}

async fn reconnect_timer_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
	match timer {
		| Some(sleep) => sleep.as_mut().await,
		| None => pending().await,
	}
}

/// Tries every endpoint in order, each bounded by `timeout`.
async fn try_endpoints(
	connector: Arc<dyn Connector>,
	endpoints: Arc<[ArcStr]>,
	timeout: Duration,
) -> Result<Link, ConnectionError> {
	let mut attempts = Vec::with_capacity(endpoints.len());
	for endpoint in endpoints.iter() {
		debug!(endpoint = %endpoint, "Trying endpoint");
		match tokio::time::timeout(timeout, connector.open(endpoint.clone())).await
		{
			| Ok(Ok(link)) => {
				info!(endpoint = %endpoint, "Connected");
				return Ok(link);
			}
			| Ok(Err(err)) => {
				warn!(endpoint = %endpoint, error = %err, "Endpoint failed");
				attempts.push(EndpointFailure {
					endpoint: endpoint.clone(),
					reason: err.to_string(),
					timed_out: false,
				});
			}
			| Err(_) => {
				warn!(endpoint = %endpoint, timeout = ?timeout, "Endpoint timed out");
				attempts.push(EndpointFailure {
					endpoint: endpoint.clone(),
					reason: format!("timed out after {}ms", timeout.as_millis()),
					timed_out: true,
				});
			}
		}
	}
	Err(ConnectionError::AllEndpointsFailed { attempts })
}

pub struct ConnectionManagerController {
	shutdown_tx: oneshot::Sender<()>,
	join_handle: JoinHandle<()>,
}

impl ConnectionManagerController {
	pub async fn shutdown(self) -> Result<(), tokio::task::JoinError> {
		let _ = self.shutdown_tx.send(()).inspect_err(|_| {
			warn!("ConnectionManagerController: Actor already stopped");
		});
		self.join_handle.await.inspect_err(|e| {
			warn!(error = ?e, "ConnectionManagerController: Actor run failed");
		})
	}
}

#[derive(Debug, Clone)]
pub struct ConnectionManagerHandler {
	command_tx: Sender<Command>,
	unsubscribe_tx: Sender<SubscriptionId>,
	state_rx: watch::Receiver<ConnectionState>,
	subscriber_queue_capacity: usize,
}

impl ConnectionManagerHandler {
	pub async fn connect(&self) -> Result<(), ConnectionError> {
		let (tx, rx) = oneshot::channel();
		self.command_tx
			.send(Command::Connect(tx))
			.await
			.map_err(|_| ConnectionError::ManagerUnavailable)?;
		rx.await.map_err(|_| ConnectionError::ManagerUnavailable)?
	}

	/// Returns false when the manager is no longer running.
	pub async fn disconnect(&self) -> bool {
		let (tx, rx) = oneshot::channel();
		if self.command_tx.send(Command::Disconnect(tx)).await.is_err() {
			return false;
		}
		rx.await.is_ok()
	}

	pub async fn subscribe(
		&self,
		pattern: TopicPatternPath,
		handler: MessageHandler,
	) -> Option<SubscriptionId> {
		let (tx, rx) = oneshot::channel();
		self.command_tx
			.send(Command::Subscribe {
				pattern,
				handler,
				reply: tx,
			})
			.await
			.ok()?;
		rx.await.ok()
	}

	pub async fn unsubscribe(
		&self,
		pattern: TopicPatternPath,
		id: Option<SubscriptionId>,
	) -> Option<Result<usize, TopicRouterError>> {
		let (tx, rx) = oneshot::channel();
		self.command_tx
			.send(Command::Unsubscribe {
				pattern,
				id,
				reply: tx,
			})
			.await
			.ok()?;
		rx.await.ok()
	}

	pub async fn publish(&self, topic: ArcStr, payload: String) -> bool {
		let (tx, rx) = oneshot::channel();
		let sent = self
			.command_tx
			.send(Command::Publish {
				topic,
				payload,
				reply: tx,
			})
			.await;
		if sent.is_err() {
			warn!("Publish dropped, connection manager stopped");
			return false;
		}
		rx.await.unwrap_or(false)
	}

	pub fn state(&self) -> ConnectionState {
		*self.state_rx.borrow()
	}

	pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
		self.state_rx.clone()
	}

	pub fn unsubscribe_sender(&self) -> Sender<SubscriptionId> {
		self.unsubscribe_tx.clone()
	}

	pub fn subscriber_queue_capacity(&self) -> usize {
		self.subscriber_queue_capacity
	}
}
