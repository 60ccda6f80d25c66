use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use arcstr::ArcStr;
use lru::LruCache;
use tracing::{debug, error, warn};

use super::handler::MessageHandler;
use crate::payload::InboundMessage;
use crate::topic::validation::validate_inbound_topic;
use crate::topic::{
	SubscriptionId, TopicPath, TopicPatternPath, TopicRouter, TopicRouterError,
};

/// Outcome of dispatching one inbound message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
	/// Callbacks that returned `Ok`
	pub delivered: usize,
	/// Callbacks that returned `Err` or panicked
	pub failed: usize,
}

impl DispatchReport {
	/// Number of callbacks the message matched.
	pub fn matched(&self) -> usize {
		self.delivered + self.failed
	}
}

/// Subscription registry plus fan-out of inbound messages.
///
/// Owned by the connection manager task, so every operation runs to
/// completion before the next one starts.
pub struct Dispatcher {
	router: TopicRouter<MessageHandler>,
	topic_cache: LruCache<ArcStr, Arc<TopicPath>>,
}

impl std::fmt::Debug for Dispatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Dispatcher")
			.field("subscriptions", &self.router.len())
			.field("cached_topics", &self.topic_cache.len())
			.finish()
	}
}

impl Dispatcher {
	pub fn new(topic_cache_size: NonZeroUsize) -> Self {
		Self {
			router: TopicRouter::new(),
			topic_cache: LruCache::new(topic_cache_size),
		}
	}

	/// Appends `handler` to the callbacks of `pattern`.
	///
	/// Returns true as first element when the pattern is new to the registry.
	pub fn subscribe(
		&mut self,
		pattern: TopicPatternPath,
		handler: MessageHandler,
	) -> (bool, SubscriptionId) {
		let (fresh, id) = self.router.add_subscription(pattern, handler);
		debug!(subscription_id = %id, fresh_pattern = fresh, "Callback registered");
		(fresh, id)
	}

	/// Removes one callback, or all callbacks of `pattern` when `id` is
	/// `None`.
	///
	/// Returns how many callbacks were removed and whether the pattern is
	/// gone from the registry. Unknown ids and patterns remove nothing.
	pub fn unsubscribe(
		&mut self,
		pattern: &TopicPatternPath,
		id: Option<SubscriptionId>,
	) -> Result<(usize, bool), TopicRouterError> {
		match id {
			| None => {
				let removed = self.router.unsubscribe_pattern(pattern);
				Ok((removed.len(), !removed.is_empty()))
			}
			| Some(id) => match self.router.unsubscribe_from(pattern, &id) {
				| Ok((emptied, _)) => Ok((1, emptied)),
				| Err(TopicRouterError::SubscriptionNotFound { .. }) => {
					debug!(subscription_id = %id, pattern = %pattern, "Nothing to unsubscribe");
					Ok((0, false))
				}
				| Err(err) => Err(err),
			},
		}
	}

	/// Removes a callback by id alone.
	///
	/// Returns the pattern when it lost its last callback.
	pub fn unsubscribe_id(
		&mut self,
		id: SubscriptionId,
	) -> Option<TopicPatternPath> {
		match self.router.unsubscribe(&id) {
			| Ok((true, pattern)) => Some(pattern),
			| Ok((false, _)) => None,
			| Err(err) => {
				debug!(subscription_id = %id, error = %err, "Unsubscribe by id ignored");
				None
			}
		}
	}

	/// Runs every callback whose pattern matches the message topic.
	///
	/// Callbacks run in pattern registration order, then callback
	/// registration order. A failing or panicking callback is logged and
	/// the remaining ones still run.
	pub fn dispatch(&mut self, message: &InboundMessage) -> DispatchReport {
		let mut report = DispatchReport::default();
		if let Err(err) = validate_inbound_topic(&message.topic) {
			warn!(topic = %message.topic, error = %err, "Dropping message with invalid topic");
			return report;
		}
		let topic = self.topic_path(&message.topic);

		for (id, pattern, handler) in self.router.get_subscribers(&topic) {
			match catch_unwind(AssertUnwindSafe(|| handler(message))) {
				| Ok(Ok(())) => report.delivered += 1,
				| Ok(Err(err)) => {
					report.failed += 1;
					error!(
						subscription_id = %id,
						pattern = %pattern,
						topic = %message.topic,
						error = %err,
						"Message callback failed"
					);
				}
				| Err(panic) => {
					report.failed += 1;
					error!(
						subscription_id = %id,
						pattern = %pattern,
						topic = %message.topic,
						panic = panic_message(panic.as_ref()),
						"Message callback panicked"
					);
				}
			}
		}
		if report.matched() == 0 {
			debug!(topic = %message.topic, "No subscriber for topic");
		}
		report
	}

	fn topic_path(&mut self, topic: &ArcStr) -> Arc<TopicPath> {
		if let Some(path) = self.topic_cache.get(topic.as_str()) {
			return Arc::clone(path);
		}
		let path = Arc::new(TopicPath::new(topic.clone()));
		self.topic_cache.put(topic.clone(), Arc::clone(&path));
		path
	}

	/// Distinct patterns with at least one callback.
	pub fn active_patterns(&self) -> Vec<ArcStr> {
		self.router.active_patterns()
	}

	/// Number of registered callbacks.
	pub fn len(&self) -> usize {
		self.router.len()
	}

	pub fn is_empty(&self) -> bool {
		self.router.is_empty()
	}

	/// Drops every subscription.
	pub fn clear(&mut self) {
		self.router.cleanup();
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
	if let Some(message) = panic.downcast_ref::<&str>() {
		message
	} else if let Some(message) = panic.downcast_ref::<String>() {
		message.as_str()
	} else {
		"non-string panic payload"
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use super::*;
	use crate::routing::handler::{handler, infallible};
	use crate::topic::limits::MAX_TOPIC_DEPTH;

	fn dispatcher() -> Dispatcher {
		Dispatcher::new(NonZeroUsize::new(8).unwrap())
	}

	fn pattern(s: &str) -> TopicPatternPath {
		TopicPatternPath::new(s.to_string()).unwrap()
	}

	fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &str) -> MessageHandler {
		let log = Arc::clone(log);
		let name = name.to_string();
		infallible(move |message| {
			log.lock().unwrap().push(format!("{name}:{}", message.topic));
		})
	}

	#[test]
	fn test_dispatch_in_registration_order() {
		let log = Arc::new(Mutex::new(Vec::new()));
		let mut dispatcher = dispatcher();
		dispatcher.subscribe(pattern("doorlock/#"), recorder(&log, "a"));
		dispatcher.subscribe(pattern("doorlock/status/+"), recorder(&log, "b"));
		dispatcher.subscribe(pattern("doorlock/#"), recorder(&log, "c"));
		dispatcher.subscribe(pattern("alarms/#"), recorder(&log, "d"));

		let report = dispatcher
			.dispatch(&InboundMessage::new("doorlock/status/door", b"{}"));
		assert_eq!(report, DispatchReport {
			delivered: 3,
			failed: 0
		});
		assert_eq!(*log.lock().unwrap(), vec![
			"a:doorlock/status/door",
			"c:doorlock/status/door",
			"b:doorlock/status/door",
		]);
	}

	#[test]
	fn test_failing_callbacks_are_isolated() {
		let log = Arc::new(Mutex::new(Vec::new()));
		let mut dispatcher = dispatcher();
		dispatcher.subscribe(
			pattern("alarms/#"),
			handler(|_| Err("callback rejected message".into())),
		);
		dispatcher.subscribe(
			pattern("alarms/+"),
			infallible(|_| panic!("callback exploded")),
		);
		dispatcher.subscribe(pattern("alarms/fire"), recorder(&log, "ok"));

		let report = dispatcher.dispatch(&InboundMessage::new("alarms/fire", b"1"));
		assert_eq!(report.delivered, 1);
		assert_eq!(report.failed, 2);
		assert_eq!(*log.lock().unwrap(), vec!["ok:alarms/fire"]);
	}

	#[test]
	fn test_unsubscribe_single_and_all() {
		let log = Arc::new(Mutex::new(Vec::new()));
		let mut dispatcher = dispatcher();
		let topic = pattern("attendance/#");
		let (fresh, first) = dispatcher.subscribe(topic.clone(), recorder(&log, "1"));
		assert!(fresh);
		let (fresh, _second) =
			dispatcher.subscribe(topic.clone(), recorder(&log, "2"));
		assert!(!fresh);

		assert_eq!(dispatcher.unsubscribe(&topic, Some(first)).unwrap(), (1, false));
		assert_eq!(dispatcher.unsubscribe(&topic, Some(first)).unwrap(), (0, false));
		dispatcher.dispatch(&InboundMessage::new("attendance/new", b""));
		assert_eq!(*log.lock().unwrap(), vec!["2:attendance/new"]);

		assert_eq!(dispatcher.unsubscribe(&topic, None).unwrap(), (1, true));
		assert!(dispatcher.is_empty());
		assert!(dispatcher.active_patterns().is_empty());
		assert_eq!(dispatcher.unsubscribe(&topic, None).unwrap(), (0, false));
	}

	#[test]
	fn test_unsubscribe_with_foreign_id_fails() {
		let mut dispatcher = dispatcher();
		let (_, id) = dispatcher.subscribe(pattern("a/b"), infallible(|_| {}));
		assert!(matches!(
			dispatcher.unsubscribe(&pattern("a/c"), Some(id)),
			Err(TopicRouterError::PatternMismatch { .. })
		));
		assert_eq!(dispatcher.len(), 1);
	}

	#[test]
	fn test_unsubscribe_by_id_reports_emptied_pattern() {
		let mut dispatcher = dispatcher();
		let (_, a) = dispatcher.subscribe(pattern("x/+"), infallible(|_| {}));
		let (_, b) = dispatcher.subscribe(pattern("x/+"), infallible(|_| {}));
		assert!(dispatcher.unsubscribe_id(a).is_none());
		assert_eq!(dispatcher.unsubscribe_id(b).unwrap().as_str(), "x/+");
		assert!(dispatcher.unsubscribe_id(b).is_none());
	}

	#[test]
	fn test_invalid_inbound_topic_is_dropped() {
		let mut dispatcher = dispatcher();
		dispatcher.subscribe(pattern("#"), infallible(|_| {}));
		let report = dispatcher.dispatch(&InboundMessage::new("", b"x"));
		assert_eq!(report.matched(), 0);
	}

	#[test]
	fn test_hash_accepts_topics_deeper_than_pattern_limit() {
		let log = Arc::new(Mutex::new(Vec::new()));
		let mut dispatcher = dispatcher();
		dispatcher.subscribe(pattern("alarms/#"), recorder(&log, "deep"));

		let topic = format!("alarms/{}", vec!["zone"; MAX_TOPIC_DEPTH].join("/"));
		let report = dispatcher.dispatch(&InboundMessage::new(topic.clone(), b"1"));
		assert_eq!(report.delivered, 1);
		assert_eq!(*log.lock().unwrap(), vec![format!("deep:{topic}")]);
	}

	#[test]
	fn test_topic_cache_reuses_paths() {
		let mut dispatcher = dispatcher();
		let topic = ArcStr::from("doorlock/D1/status/door");
		let first = dispatcher.topic_path(&topic);
		let second = dispatcher.topic_path(&topic);
		assert!(Arc::ptr_eq(&first, &second));
	}
}
