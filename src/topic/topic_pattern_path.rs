use std::convert::TryFrom;
use std::slice::Iter;
use std::sync::Arc;

use arcstr::ArcStr;
use smallvec::SmallVec;

use super::limits::MAX_TOPIC_DEPTH;
use super::topic_match::{TopicMatch, TopicPath};
use super::topic_pattern_item::{TopicPatternError, TopicPatternItem};

/// Parsed MQTT subscription pattern with wildcard support.
///
/// Construction validates the pattern once, so a `TopicPatternPath` that
/// exists is always well formed: `#` can only be the last level and
/// wildcards always occupy a whole level.
#[derive(Debug, Clone)]
pub struct TopicPatternPath {
	pattern: ArcStr,
	segments: Vec<TopicPatternItem>,
}

impl TopicPatternPath {
	/// Parses and validates a subscription pattern.
	pub fn new(
		topic_pattern: impl Into<ArcStr>,
	) -> Result<Self, TopicPatternError> {
		let topic_pattern = topic_pattern.into();
		if topic_pattern.is_empty() || topic_pattern.trim().is_empty() {
			return Err(TopicPatternError::EmptyTopic);
		}

		let segments = topic_pattern
			.split('/')
			.map(|s| topic_pattern.substr_from(s))
			.map(TopicPatternItem::try_from)
			.collect::<Result<Vec<_>, _>>()?;

		if segments.len() > MAX_TOPIC_DEPTH {
			return Err(TopicPatternError::TooDeep {
				depth: segments.len(),
				max: MAX_TOPIC_DEPTH,
			});
		}

		if let Some(hash_pos) = segments
			.iter()
			.position(|s| matches!(*s, TopicPatternItem::Hash))
		{
			if hash_pos != segments.len() - 1 {
				return Err(TopicPatternError::hash_position(
					topic_pattern.as_str(),
				));
			}
		}

		Ok(Self {
			pattern: topic_pattern,
			segments,
		})
	}

	/// Creates a topic pattern from segments directly, useful for testing.
	#[cfg(test)]
	pub fn new_from_segments(
		segments: &[TopicPatternItem],
	) -> Result<Self, TopicPatternError> {
		let pattern = segments
			.iter()
			.map(TopicPatternItem::as_str)
			.collect::<Vec<_>>()
			.join("/");
		Self::new(pattern)
	}

	/// Returns the pattern string as sent to the broker.
	pub fn mqtt_pattern(&self) -> ArcStr {
		self.pattern.clone()
	}

	/// Returns the pattern string.
	pub fn as_str(&self) -> &str {
		&self.pattern
	}

	/// Returns true if the pattern contains no wildcard at all.
	pub fn is_exact(&self) -> bool {
		!self.segments.iter().any(TopicPatternItem::is_wildcard)
	}

	/// Returns true if pattern contains multi-level wildcard (#).
	pub fn contains_hash(&self) -> bool {
		self.segments
			.last()
			.is_some_and(|s| matches!(s, TopicPatternItem::Hash))
	}

	/// Returns iterator over pattern segments.
	pub fn iter(&self) -> Iter<'_, TopicPatternItem> {
		self.segments.iter()
	}

	/// Returns number of segments in pattern.
	pub fn len(&self) -> usize {
		self.segments.len()
	}

	/// Returns true if pattern has no segments.
	pub fn is_empty(&self) -> bool {
		self.segments.is_empty()
	}

	/// Returns pattern segments as slice.
	pub fn slice(&self) -> &[TopicPatternItem] {
		&self.segments
	}

	/// Returns true if `topic` is matched by this pattern.
	pub fn matches(&self, topic: &TopicPath) -> bool {
		super::topic_matcher::matches(self, topic)
	}

	/// Matches a topic against this pattern, returning wildcard captures.
	pub fn captures(&self, topic: Arc<TopicPath>) -> Option<TopicMatch> {
		let mut topic_index = 0;
		let mut params = SmallVec::new();
		for pattern_segment in self.iter() {
			match pattern_segment {
				| TopicPatternItem::Str(expected) => {
					if topic.segments.get(topic_index)? != expected {
						return None;
					}
					topic_index += 1;
				}
				| TopicPatternItem::Plus => {
					if topic_index >= topic.segments.len() {
						return None;
					}
					params.push(topic_index .. topic_index + 1);
					topic_index += 1;
				}
				| TopicPatternItem::Hash => {
					params.push(topic_index .. topic.segments.len());
					return Some(TopicMatch::from_match_result(topic, params));
				}
			}
		}
		if topic_index < topic.segments.len() {
			return None;
		}
		Some(TopicMatch::from_match_result(topic, params))
	}
}

impl PartialEq for TopicPatternPath {
	fn eq(&self, other: &Self) -> bool {
		self.pattern == other.pattern
	}
}

impl Eq for TopicPatternPath {}

impl std::fmt::Display for TopicPatternPath {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.pattern)
	}
}

impl TryFrom<String> for TopicPatternPath {
	type Error = TopicPatternError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl TryFrom<&str> for TopicPatternPath {
	type Error = TopicPatternError;

	fn try_from(value: &str) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl TryFrom<ArcStr> for TopicPatternPath {
	type Error = TopicPatternError;

	fn try_from(value: ArcStr) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl TryFrom<&TopicPatternPath> for TopicPatternPath {
	type Error = std::convert::Infallible;

	fn try_from(value: &TopicPatternPath) -> Result<Self, Self::Error> {
		Ok(value.clone())
	}
}
