//! Topic limits and validation helpers
//!
//! Shared constants and the checks applied to concrete topics before they
//! are published or routed. Each submodule keeps its own error type.

use super::topic_router::TopicRouterError;

/// Topic processing limits and constants
pub mod limits {
	/// Maximum topic nesting depth allowed
	pub const MAX_TOPIC_DEPTH: usize = 32;

	/// Maximum total topic length accepted for publishing (MQTT string limit)
	pub const MAX_TOPIC_LENGTH: usize = 65535;
}

/// Validation utilities for topic operations
pub mod validation {
	use super::TopicRouterError;
	use super::limits::*;

	/// Validates a concrete topic used for publishing.
	///
	/// The topic must be non-empty, fit the MQTT length limit and must not
	/// contain wildcard characters or NUL.
	pub fn validate_publish_topic(topic: &str) -> Result<(), TopicRouterError> {
		if topic.is_empty() || topic.len() > MAX_TOPIC_LENGTH {
			return Err(TopicRouterError::invalid_routing_topic(
				topic,
				"Topic is empty or too long",
			));
		}
		if topic.chars().any(|c| matches!(c, '\0' | '#' | '+')) {
			return Err(TopicRouterError::invalid_routing_topic(
				topic,
				"Topic contains illegal characters ('#', '+', or null byte)",
			));
		}
		Ok(())
	}

	/// Validates a topic received from the transport before routing it.
	///
	/// Only empty topics are rejected: the depth limit applies to
	/// subscription patterns, and a trailing `#` accepts any number of
	/// levels.
	pub fn validate_inbound_topic(topic: &str) -> Result<(), TopicRouterError> {
		if topic.is_empty() {
			return Err(TopicRouterError::invalid_routing_topic(
				topic,
				"Inbound topic is empty",
			));
		}
		Ok(())
	}

	#[cfg(test)]
	mod tests {
		use super::*;

		#[test]
		fn test_publish_topic_rules() {
			assert!(validate_publish_topic("doorlock/D01/control").is_ok());
			assert!(validate_publish_topic("").is_err());
			assert!(validate_publish_topic("doorlock/+/control").is_err());
			assert!(validate_publish_topic("doorlock/#").is_err());
			assert!(validate_publish_topic("door\0lock").is_err());
			assert!(
				validate_publish_topic(&"a".repeat(MAX_TOPIC_LENGTH + 1))
					.is_err()
			);
		}

		#[test]
		fn test_inbound_topic_rules() {
			assert!(validate_inbound_topic("attendance/new").is_ok());
			assert!(validate_inbound_topic("").is_err());
			assert!(
				validate_inbound_topic(&vec!["x"; MAX_TOPIC_DEPTH + 8].join("/"))
					.is_ok()
			);
		}
	}
}
