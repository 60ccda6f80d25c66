use thiserror::Error;

use crate::topic::{TopicPatternError, TopicRouterError};

/// Errors during subscription operations
#[derive(Debug, Error)]
pub enum SubscriptionError {
	/// Pattern could not be parsed
	#[error("Invalid topic pattern: {0}")]
	InvalidPattern(#[from] TopicPatternError),
	/// Registry refused the operation
	#[error("Subscription registry error: {0}")]
	Router(#[from] TopicRouterError),
	/// Connection manager is gone
	#[error("Communication channel closed")]
	ChannelClosed,
}
