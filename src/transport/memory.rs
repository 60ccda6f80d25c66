//! In-process transport
//!
//! [`MemoryConnector`] never touches the network. Every successful `open`
//! creates a [`MemoryPeer`], the far end of the link, which tests and demos
//! use to push inbound messages, drop the connection and look at what the
//! client sent. Endpoints can be scripted to fail, hang or answer late.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use arcstr::ArcStr;
use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::Notify;
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::debug;

use super::{Connector, Link, LinkCommand, LinkEvent, TransportError};

#[derive(Debug, Clone)]
enum EndpointBehavior {
	Fail(String),
	Hang,
	Delay(Duration),
}

#[derive(Debug, Default)]
struct MemoryState {
	opened: usize,
	behaviors: HashMap<String, EndpointBehavior>,
	refuse_all: Option<String>,
	echo: bool,
	peers: Vec<MemoryPeer>,
}

/// Connector whose links end inside the process.
///
/// Clones share state, so a test can keep one clone and hand another to the
/// client.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
	state: Arc<Mutex<MemoryState>>,
	channel_capacity: usize,
}

impl Default for MemoryConnector {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryConnector {
	/// Creates a connector where every endpoint accepts immediately.
	pub fn new() -> Self {
		Self {
			state: Arc::new(Mutex::new(MemoryState::default())),
			channel_capacity: 100,
		}
	}

	/// Creates a connector that loops published messages back as inbound
	/// messages, acting as a minimal broker.
	pub fn echo() -> Self {
		let connector = Self::new();
		connector.lock().echo = true;
		connector
	}

	fn lock(&self) -> MutexGuard<'_, MemoryState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Makes every open of `endpoint` fail with `reason`.
	pub fn fail_endpoint(&self, endpoint: &str, reason: impl Into<String>) {
		self.lock()
			.behaviors
			.insert(endpoint.to_string(), EndpointBehavior::Fail(reason.into()));
	}

	/// Makes every open of `endpoint` wait forever.
	pub fn hang_endpoint(&self, endpoint: &str) {
		self.lock()
			.behaviors
			.insert(endpoint.to_string(), EndpointBehavior::Hang);
	}

	/// Makes opens of `endpoint` succeed after `delay`.
	pub fn delay_endpoint(&self, endpoint: &str, delay: Duration) {
		self.lock()
			.behaviors
			.insert(endpoint.to_string(), EndpointBehavior::Delay(delay));
	}

	/// Restores the default behavior for `endpoint`.
	pub fn heal_endpoint(&self, endpoint: &str) {
		self.lock().behaviors.remove(endpoint);
	}

	/// Makes every later open fail, whatever the endpoint.
	pub fn refuse_all(&self, reason: impl Into<String>) {
		self.lock().refuse_all = Some(reason.into());
	}

	/// Undoes [`refuse_all`](Self::refuse_all).
	pub fn accept_all(&self) {
		self.lock().refuse_all = None;
	}

	/// Number of opens attempted so far, failed ones included.
	pub fn opened_count(&self) -> usize {
		self.lock().opened
	}

	/// Peers of every link opened so far, oldest first.
	pub fn peers(&self) -> Vec<MemoryPeer> {
		self.lock().peers.clone()
	}

	/// Peer of the most recent link.
	pub fn last_peer(&self) -> Option<MemoryPeer> {
		self.lock().peers.last().cloned()
	}
}

impl Connector for MemoryConnector {
	fn open(
		&self,
		endpoint: ArcStr,
	) -> BoxFuture<'static, Result<Link, TransportError>> {
		let (behavior, refuse_all) = {
			let mut state = self.lock();
			state.opened += 1;
			(
				state.behaviors.get(endpoint.as_str()).cloned(),
				state.refuse_all.clone(),
			)
		};
		let connector = self.clone();
		async move {
			if let Some(reason) = refuse_all {
				return Err(TransportError::Refused(reason));
			}
			match behavior {
				| Some(EndpointBehavior::Fail(reason)) => {
					return Err(TransportError::Refused(reason));
				}
				| Some(EndpointBehavior::Hang) => {
					futures::future::pending::<()>().await;
				}
				| Some(EndpointBehavior::Delay(delay)) => {
					tokio::time::sleep(delay).await;
				}
				| None => {}
			}
			Ok(connector.attach(endpoint))
		}
		.boxed()
	}
}

impl MemoryConnector {
	fn attach(&self, endpoint: ArcStr) -> Link {
		let (link, command_rx, event_tx) = Link::channel(self.channel_capacity);
		let peer = MemoryPeer {
			endpoint,
			event_tx,
			commands: Arc::new(Mutex::new(Vec::new())),
			closed: Arc::new(AtomicBool::new(false)),
			stalled: Arc::new(Notify::new()),
		};
		let echo = {
			let mut state = self.lock();
			state.peers.push(peer.clone());
			state.echo
		};
		tokio::spawn(run_peer(peer, command_rx, echo));
		link
	}
}

/// Records commands from the client, echoing publishes when asked to.
async fn run_peer(
	peer: MemoryPeer,
	mut command_rx: Receiver<LinkCommand>,
	echo: bool,
) {
	loop {
		let command = tokio::select! {
			command = command_rx.recv() => command,
			() = peer.stalled.notified() => {
				debug!(endpoint = %peer.endpoint, "Memory link stopped reading");
				return;
			}
		};
		let Some(command) = command else {
			break;
		};
		if echo {
			if let LinkCommand::Publish { topic, payload } = &command {
				let event = LinkEvent::Message {
					topic: topic.to_string(),
					payload: Bytes::from(payload.clone()),
				};
				if peer.event_tx.try_send(event).is_err() {
					debug!(topic = %topic, "Echo dropped, client not reading");
				}
			}
		}
		let close = command == LinkCommand::Close;
		peer.commands_log().push(command);
		if close {
			break;
		}
	}
	peer.closed.store(true, Ordering::SeqCst);
	debug!(endpoint = %peer.endpoint, "Memory link closed by client");
}

/// Far end of a memory link.
#[derive(Debug, Clone)]
pub struct MemoryPeer {
	endpoint: ArcStr,
	event_tx: Sender<LinkEvent>,
	commands: Arc<Mutex<Vec<LinkCommand>>>,
	closed: Arc<AtomicBool>,
	stalled: Arc<Notify>,
}

impl MemoryPeer {
	fn commands_log(&self) -> MutexGuard<'_, Vec<LinkCommand>> {
		self.commands.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Endpoint this link was opened for.
	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	/// Pushes an inbound message to the client.
	///
	/// Returns false when the client no longer reads from the link.
	pub async fn deliver(&self, topic: &str, payload: impl Into<Bytes>) -> bool {
		self.event_tx
			.send(LinkEvent::Message {
				topic: topic.to_string(),
				payload: payload.into(),
			})
			.await
			.is_ok()
	}

	/// Simulates the socket dropping under the client.
	pub async fn drop_connection(&self, reason: &str) -> bool {
		self.event_tx
			.send(LinkEvent::Closed {
				reason: Some(reason.to_string()),
			})
			.await
			.is_ok()
	}

	/// Stops taking commands from the client without reporting a close.
	///
	/// The client still believes the link is up, but every later command
	/// it sends is refused.
	pub fn stop_reading(&self) {
		self.stalled.notify_one();
	}

	/// Commands received so far, in arrival order.
	pub fn commands(&self) -> Vec<LinkCommand> {
		self.commands_log().clone()
	}

	/// Topic and payload of every publish received so far.
	pub fn published(&self) -> Vec<(String, String)> {
		self.commands_log()
			.iter()
			.filter_map(|command| match command {
				| LinkCommand::Publish { topic, payload } => {
					Some((topic.to_string(), payload.clone()))
				}
				| _ => None,
			})
			.collect()
	}

	/// Patterns subscribed through this link, in order.
	pub fn subscribed(&self) -> Vec<String> {
		self.commands_log()
			.iter()
			.filter_map(|command| match command {
				| LinkCommand::Subscribe(pattern) => Some(pattern.to_string()),
				| _ => None,
			})
			.collect()
	}

	/// True once the client closed or dropped its side of the link.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_open_counts_and_records() {
		let connector = MemoryConnector::new();
		let link = connector.open(arcstr::literal!("ws://a")).await.unwrap();
		assert_eq!(connector.opened_count(), 1);

		link.outbound
			.send(LinkCommand::Subscribe(arcstr::literal!("alarms/#")))
			.await
			.unwrap();
		drop(link);
		tokio::task::yield_now().await;

		let peer = connector.last_peer().unwrap();
		tokio::time::timeout(Duration::from_secs(1), async {
			while !peer.is_closed() {
				tokio::task::yield_now().await;
			}
		})
		.await
		.unwrap();
		assert_eq!(peer.subscribed(), vec!["alarms/#".to_string()]);
		assert_eq!(peer.endpoint(), "ws://a");
	}

	#[tokio::test]
	async fn test_failing_endpoint() {
		let connector = MemoryConnector::new();
		connector.fail_endpoint("ws://down", "refused");
		let err = connector.open(arcstr::literal!("ws://down")).await.unwrap_err();
		assert!(matches!(err, TransportError::Refused(reason) if reason == "refused"));
		assert_eq!(connector.opened_count(), 1);
		assert!(connector.last_peer().is_none());
	}

	#[tokio::test]
	async fn test_echo_loops_publishes_back() {
		let connector = MemoryConnector::echo();
		let mut link = connector.open(arcstr::literal!("ws://a")).await.unwrap();
		link.outbound
			.send(LinkCommand::Publish {
				topic: arcstr::literal!("system/update"),
				payload: "v2".to_string(),
			})
			.await
			.unwrap();
		let event = link.inbound.recv().await.unwrap();
		assert_eq!(
			event,
			LinkEvent::Message {
				topic: "system/update".to_string(),
				payload: Bytes::from_static(b"v2"),
			}
		);
	}
}
