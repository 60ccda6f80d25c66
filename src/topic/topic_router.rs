#![allow(clippy::missing_docs_in_private_items)]
#![allow(missing_docs)]
use std::collections::HashMap;
use std::fmt::Display;

use arcstr::ArcStr;
use thiserror::Error;

use super::topic_matcher::{Len, TopicMatcherError, TopicMatcherNode};
use super::topic_pattern_item::TopicPatternError;
use super::topic_pattern_path::TopicPatternPath;
use crate::topic::topic_match::TopicPath;

/// Errors that can occur during topic routing operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicRouterError {
	/// Topic pattern validation failed
	#[error("Invalid topic pattern: {0}")]
	InvalidPattern(#[from] TopicPatternError),

	/// Topic matching operation failed
	#[error("Topic matching failed: {0}")]
	MatchingFailed(#[from] TopicMatcherError),

	/// Subscription with given ID was not found
	#[error("Subscription {id} not found")]
	SubscriptionNotFound { id: SubscriptionId },

	/// Subscription exists but under a different pattern
	#[error("Subscription {id} is registered under '{actual}', not '{requested}'")]
	PatternMismatch {
		id: SubscriptionId,
		requested: String,
		actual: String,
	},

	/// Topic is invalid for routing operations
	#[error("Topic '{topic}' is invalid for routing: {reason}")]
	InvalidRoutingTopic { topic: String, reason: String },
}

impl TopicRouterError {
	/// Creates a new SubscriptionNotFound error
	pub fn subscription_not_found(id: SubscriptionId) -> Self {
		Self::SubscriptionNotFound { id }
	}

	/// Creates a new InvalidRoutingTopic error
	pub fn invalid_routing_topic(
		topic: impl Into<String>,
		reason: impl Into<String>,
	) -> Self {
		Self::InvalidRoutingTopic {
			topic: topic.into(),
			reason: reason.into(),
		}
	}
}

/// A subscription identifier.
///
/// Returned by `subscribe` and accepted by `unsubscribe` to remove one
/// particular callback.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, PartialOrd, Ord)]
pub struct SubscriptionId(usize);

impl Display for SubscriptionId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "SubscriptionId({})", self.0)
	}
}

/// Callbacks registered under one pattern, in registration order.
///
/// `order` is the position of the pattern itself in the registry. It is
/// assigned when the pattern gets its first callback and is used to sort
/// matches across patterns.
#[derive(Debug)]
pub struct PatternEntry<T> {
	order: u64,
	handlers: Vec<(SubscriptionId, T)>,
}

impl<T> Default for PatternEntry<T> {
	fn default() -> Self {
		Self {
			order: 0,
			handlers: Vec::new(),
		}
	}
}

impl<T> Len for PatternEntry<T> {
	fn len(&self) -> usize {
		self.handlers.len()
	}
}

/// Registry of subscription patterns and their callbacks.
pub struct TopicRouter<T> {
	topic_matcher: TopicMatcherNode<PatternEntry<T>>,
	subscriptions: HashMap<SubscriptionId, TopicPatternPath>,
	next_id: usize,
	next_order: u64,
}

impl<T> Default for TopicRouter<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> TopicRouter<T> {
	pub fn new() -> Self {
		Self {
			topic_matcher: TopicMatcherNode::new(),
			subscriptions: HashMap::new(),
			next_id: 0,
			next_order: 0,
		}
	}

	/// Appends `subscription` to the callbacks of `topic`.
	///
	/// Returns true as first element when the pattern was not registered
	/// before, i.e. the broker has to be told about it.
	pub fn add_subscription(
		&mut self,
		topic: TopicPatternPath,
		subscription: T,
	) -> (bool, SubscriptionId) {
		let entry = self.topic_matcher.subscribe_to_pattern(&topic);
		let fresh_topic = entry.handlers.is_empty();
		if fresh_topic {
			entry.order = self.next_order;
			self.next_order += 1;
		}

		let id = SubscriptionId(self.next_id);
		self.next_id = self.next_id.wrapping_add(1);

		entry.handlers.push((id, subscription));
		self.subscriptions.insert(id, topic);

		(fresh_topic, id)
	}

	/// Removes one subscription.
	///
	/// Returns whether its pattern is now without callbacks, and the pattern.
	pub fn unsubscribe(
		&mut self,
		id: &SubscriptionId,
	) -> Result<(bool, TopicPatternPath), TopicRouterError> {
		let topic = self
			.subscriptions
			.remove(id)
			.ok_or(TopicRouterError::subscription_not_found(*id))?;
		let mut topic_now_empty = false;
		self.topic_matcher.update_node(topic.slice(), |entry| {
			entry.handlers.retain(|(sub_id, _)| sub_id != id);
			topic_now_empty = entry.handlers.is_empty();
		})?;
		Ok((topic_now_empty, topic))
	}

	/// Removes one subscription, checking it belongs to `topic`.
	pub fn unsubscribe_from(
		&mut self,
		topic: &TopicPatternPath,
		id: &SubscriptionId,
	) -> Result<(bool, TopicPatternPath), TopicRouterError> {
		let actual = self
			.subscriptions
			.get(id)
			.ok_or(TopicRouterError::subscription_not_found(*id))?;
		if actual != topic {
			return Err(TopicRouterError::PatternMismatch {
				id: *id,
				requested: topic.to_string(),
				actual: actual.to_string(),
			});
		}
		self.unsubscribe(id)
	}

	/// Removes every callback registered under `topic`.
	///
	/// Returns the removed ids in registration order; empty when the
	/// pattern was not registered.
	pub fn unsubscribe_pattern(
		&mut self,
		topic: &TopicPatternPath,
	) -> Vec<SubscriptionId> {
		let mut removed = Vec::new();
		let res = self.topic_matcher.update_node(topic.slice(), |entry| {
			removed.extend(entry.handlers.drain(..).map(|(id, _)| id));
		});
		if res.is_err() {
			return Vec::new();
		}
		for id in &removed {
			self.subscriptions.remove(id);
		}
		removed
	}

	/// Returns every subscription matching `topic`.
	///
	/// Ordered by pattern registration first, then by callback registration
	/// within a pattern.
	pub fn get_subscribers<'a>(
		&'a self,
		topic: &TopicPath,
	) -> Vec<(&'a SubscriptionId, &'a TopicPatternPath, &'a T)> {
		let mut entries = self.topic_matcher.find_by_path(topic);
		entries.sort_by_key(|entry| entry.order);
		entries
			.into_iter()
			.flat_map(|entry| entry.handlers.iter())
			.filter_map(|(id, subscription)| {
				self.subscriptions
					.get(id)
					.map(|topic_pattern| (id, topic_pattern, subscription))
			})
			.collect()
	}

	/// Get all unique active topic patterns, sorted for stable output.
	pub fn active_patterns(&self) -> Vec<ArcStr> {
		let mut patterns: Vec<ArcStr> = self
			.subscriptions
			.values()
			.map(TopicPatternPath::mqtt_pattern)
			.collect();
		patterns.sort();
		patterns.dedup();
		patterns
	}

	/// Number of registered callbacks across all patterns.
	pub fn len(&self) -> usize {
		self.subscriptions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.subscriptions.is_empty()
	}

	/// Drops every subscription.
	///
	/// Replacing the matcher drops all callbacks, which closes any channel
	/// they hold. Ids keep counting so a stale id never names a new
	/// subscription.
	pub fn cleanup(&mut self) {
		self.topic_matcher = TopicMatcherNode::new();
		self.subscriptions.clear();
		self.next_order = 0;
	}
}
