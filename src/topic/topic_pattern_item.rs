//! MQTT topic pattern item types and functionality

use std::convert::TryFrom;

use arcstr::Substr;
use thiserror::Error;

/// Error types for topic pattern parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicPatternError {
	/// Hash wildcard (#) used not at the end of the pattern
	#[error(
		"Invalid topic pattern '{pattern}': # wildcard can only be the last \
		 segment"
	)]
	HashPosition {
		/// The invalid pattern
		pattern: String,
	},

	/// Wildcard characters (+ or #) used incorrectly
	#[error("Invalid wildcard usage: {usage}")]
	WildcardUsage {
		/// Description of invalid usage
		usage: String,
	},

	/// Empty topic is not valid
	#[error("Topic pattern cannot be empty")]
	EmptyTopic,

	/// Pattern has more levels than the router accepts
	#[error("Topic pattern too deep: {depth} levels > {max}")]
	TooDeep {
		/// Number of levels in the rejected pattern
		depth: usize,
		/// Configured maximum
		max: usize,
	},
}

impl TopicPatternError {
	/// Creates a new HashPosition error
	pub fn hash_position(pattern: impl Into<String>) -> Self {
		Self::HashPosition {
			pattern: pattern.into(),
		}
	}

	/// Creates a new WildcardUsage error
	pub fn wildcard_usage(usage: impl Into<String>) -> Self {
		Self::WildcardUsage {
			usage: usage.into(),
		}
	}
}

impl From<std::convert::Infallible> for TopicPatternError {
	fn from(never: std::convert::Infallible) -> Self {
		match never {}
	}
}

/// MQTT topic pattern segment: literal string or wildcard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopicPatternItem {
	/// Literal string segment
	Str(Substr),
	/// Single-level wildcard `+`
	Plus,
	/// Multi-level wildcard `#`, only valid as the last segment
	Hash,
}

impl TopicPatternItem {
	/// Returns string representation of the pattern item.
	pub fn as_str(&self) -> &str {
		match self {
			| TopicPatternItem::Str(s) => s,
			| TopicPatternItem::Plus => "+",
			| TopicPatternItem::Hash => "#",
		}
	}

	/// Returns true if this item is a wildcard (+ or #).
	pub fn is_wildcard(&self) -> bool {
		matches!(self, TopicPatternItem::Plus | TopicPatternItem::Hash)
	}
}

impl std::fmt::Display for TopicPatternItem {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl TryFrom<Substr> for TopicPatternItem {
	type Error = TopicPatternError;

	fn try_from(item: Substr) -> Result<Self, Self::Error> {
		let res = match item.as_str() {
			| "+" => TopicPatternItem::Plus,
			| "#" => TopicPatternItem::Hash,
			| _ if item.contains(['+', '#']) => {
				return Err(TopicPatternError::wildcard_usage(format!(
					"'{item}' mixes a wildcard with other characters"
				)));
			}
			| _ => TopicPatternItem::Str(item),
		};
		Ok(res)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_literal_string_item() {
		let item = TopicPatternItem::try_from(Substr::from("doorlock")).unwrap();

		assert_eq!(item, TopicPatternItem::Str(Substr::from("doorlock")));
		assert_eq!(item.as_str(), "doorlock");
		assert!(!item.is_wildcard());
	}

	#[test]
	fn test_wildcards() {
		let plus = TopicPatternItem::try_from(Substr::from("+")).unwrap();
		let hash = TopicPatternItem::try_from(Substr::from("#")).unwrap();

		assert_eq!(plus, TopicPatternItem::Plus);
		assert_eq!(hash, TopicPatternItem::Hash);
		assert!(plus.is_wildcard() && hash.is_wildcard());
		assert_eq!(hash.to_string(), "#");
	}

	#[test]
	fn test_embedded_wildcards_rejected() {
		for segment in ["door+", "#lock", "a#b", "++"] {
			let err = TopicPatternItem::try_from(Substr::from(segment))
				.expect_err(segment);
			assert!(
				matches!(err, TopicPatternError::WildcardUsage { .. }),
				"unexpected error for {segment}: {err:?}"
			);
		}
	}

	#[test]
	fn test_empty_segment_is_literal() {
		let item = TopicPatternItem::try_from(Substr::from("")).unwrap();
		assert_eq!(item, TopicPatternItem::Str(Substr::from("")));
	}
}
