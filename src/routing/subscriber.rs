use tokio::sync::mpsc::error::{SendError, TryRecvError, TrySendError};
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::{debug, warn};

use super::handler::{MessageHandler, handler};
use crate::payload::InboundMessage;
use crate::topic::{SubscriptionId, TopicPatternPath};

/// Channel-backed subscription.
///
/// Messages matching the pattern are queued on a bounded channel and read
/// with [`receive`](Self::receive). When the queue is full new messages are
/// dropped and reported as failed deliveries. Dropping the subscriber
/// unsubscribes it.
#[derive(Debug)]
pub struct MqttSubscriber {
	receiver: Receiver<InboundMessage>,
	unsubscribe_tx: Option<Sender<SubscriptionId>>,
	pattern: TopicPatternPath,
	id: SubscriptionId,
}

impl MqttSubscriber {
	pub(crate) fn new(
		receiver: Receiver<InboundMessage>,
		unsubscribe_tx: Sender<SubscriptionId>,
		pattern: TopicPatternPath,
		id: SubscriptionId,
	) -> Self {
		Self {
			receiver,
			unsubscribe_tx: Some(unsubscribe_tx),
			pattern,
			id,
		}
	}

	/// Builds the callback feeding a subscriber's queue.
	pub(crate) fn forwarder(sender: Sender<InboundMessage>) -> MessageHandler {
		handler(move |message| match sender.try_send(message.clone()) {
			| Ok(()) => Ok(()),
			| Err(TrySendError::Full(_)) => {
				Err("subscriber queue full, message dropped".into())
			}
			| Err(TrySendError::Closed(_)) => {
				Err("subscriber dropped, message discarded".into())
			}
		})
	}

	/// Waits for the next message.
	///
	/// Returns `None` once the subscription is gone, e.g. after the client
	/// disconnected.
	pub async fn receive(&mut self) -> Option<InboundMessage> {
		self.receiver.recv().await
	}

	/// Returns a queued message without waiting.
	pub fn try_receive(&mut self) -> Option<InboundMessage> {
		match self.receiver.try_recv() {
			| Ok(message) => Some(message),
			| Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
		}
	}

	/// Pattern this subscriber listens on.
	pub fn pattern(&self) -> &TopicPatternPath {
		&self.pattern
	}

	/// Registry id of the underlying callback.
	pub fn id(&self) -> SubscriptionId {
		self.id
	}

	/// Unsubscribes, waiting for room in the command queue.
	pub async fn unsubscribe(mut self) -> Result<(), SendError<SubscriptionId>> {
		if let Some(unsubscribe_tx) = self.unsubscribe_tx.take() {
			unsubscribe_tx.send(self.id).await
		} else {
			warn!(subscription_id = %self.id, "Subscription already canceled");
			Ok(())
		}
	}
}

impl Drop for MqttSubscriber {
	fn drop(&mut self) {
		if let Some(unsubscribe_tx) = self.unsubscribe_tx.take() {
			match unsubscribe_tx.try_send(self.id) {
				| Ok(()) => {
					debug!(
						subscription_id = %self.id,
						pattern = %self.pattern,
						"Subscription unsubscribed in Drop"
					);
				}
				// Manager already stopped and cleared the registry
				| Err(TrySendError::Closed(_)) => {}
				| Err(err) => {
					warn!(
						subscription_id = %self.id,
						error = ?err,
						"Failed to unsubscribe in Drop"
					);
				}
			}
		}
	}
}
