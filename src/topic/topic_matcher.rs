#![allow(clippy::missing_docs_in_private_items)]
#![allow(missing_docs)]
use std::collections::HashMap;

use arcstr::Substr;
use thiserror::Error;

use super::topic_pattern_item::TopicPatternItem;
use super::topic_pattern_path::TopicPatternPath;
use crate::topic::topic_match::TopicPath;

/// Errors that can occur during topic matching operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicMatcherError {
	/// Pattern is not registered in the matcher tree
	#[error("Pattern '{pattern}' is not registered")]
	UnknownPattern { pattern: String },
}

impl TopicMatcherError {
	/// Creates a new UnknownPattern error
	pub fn unknown_pattern(pattern: impl Into<String>) -> Self {
		Self::UnknownPattern {
			pattern: pattern.into(),
		}
	}
}

/// Returns true if `topic` is matched by `pattern`.
///
/// Levels are compared one by one; `+` accepts any single level. A trailing
/// `#` accepts zero or more remaining levels, so `a/#` matches `a` as well
/// as `a/b/c`. Without `#` both sides must have the same number of levels.
pub fn matches(pattern: &TopicPatternPath, topic: &TopicPath) -> bool {
	let mut topic_segments = topic.segments.iter();
	for pattern_segment in pattern.iter() {
		match pattern_segment {
			| TopicPatternItem::Hash => return true,
			| TopicPatternItem::Plus => {
				if topic_segments.next().is_none() {
					return false;
				}
			}
			| TopicPatternItem::Str(expected) => match topic_segments.next() {
				| Some(segment) if segment == expected => {}
				| _ => return false,
			},
		}
	}
	topic_segments.next().is_none()
}

/// Node in the topic matching tree that represents a part of the topic path.
/// Used internally by the `TopicRouter`.
#[derive(Debug)]
pub struct TopicMatcherNode<T> {
	/// Data for exact topic segment match
	exact_match_data: Option<T>,

	/// Children nodes for exact matches of next segment
	exact_children: HashMap<Substr, TopicMatcherNode<T>>,

	/// Node for '+' pattern wildcard match (single segment)
	single_level_wildcard_node: Option<Box<TopicMatcherNode<T>>>,

	/// Data for '#' pattern wildcard match (zero or more segments)
	multi_level_wildcard_data: Option<T>,
}

pub trait Len {
	fn len(&self) -> usize;
	fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<T> Len for Vec<T> {
	fn len(&self) -> usize {
		self.len()
	}
}

impl<T: Default + Len> Default for TopicMatcherNode<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Default + Len> TopicMatcherNode<T> {
	/// Creates a new empty topic matcher node
	pub fn new() -> Self {
		Self {
			exact_match_data: None,
			exact_children: HashMap::new(),
			single_level_wildcard_node: None,
			multi_level_wildcard_data: None,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.exact_match_data.as_ref().is_none_or(T::is_empty)
			&& self.exact_children.is_empty()
			&& self.single_level_wildcard_node.is_none()
			&& self
				.multi_level_wildcard_data
				.as_ref()
				.is_none_or(T::is_empty)
	}

	/// Finds or creates the data slot for the given topic pattern
	pub fn subscribe_to_pattern(
		&mut self,
		topic_path: &TopicPatternPath,
	) -> &mut T {
		let mut current_node = self;

		for segment in topic_path.iter() {
			match segment {
				| TopicPatternItem::Str(s) => {
					current_node = current_node
						.exact_children
						.entry(s.clone())
						.or_default()
				}
				| TopicPatternItem::Plus => {
					current_node = current_node
						.single_level_wildcard_node
						.get_or_insert_with(|| Box::new(TopicMatcherNode::new()))
				}
				| TopicPatternItem::Hash => {
					// Hash wildcard must be the last segment, so we can return immediately
					return current_node
						.multi_level_wildcard_data
						.get_or_insert_with(T::default);
				}
			}
		}
		current_node.exact_match_data.get_or_insert_with(T::default)
	}

	/// Applies `f` to the data slot of an existing pattern and prunes
	/// emptied nodes. Returns true if this node became empty.
	pub fn update_node<F>(
		&mut self,
		topic_path: &[TopicPatternItem],
		f: F,
	) -> Result<bool, TopicMatcherError>
	where
		F: FnOnce(&mut T),
	{
		let Some((current_segment, rest_segments)) = topic_path.split_first()
		else {
			let data = self.exact_match_data.as_mut().ok_or_else(|| {
				TopicMatcherError::unknown_pattern("<end of pattern>")
			})?;
			f(data);
			if data.is_empty() {
				self.exact_match_data = None
			}
			return Ok(self.is_empty());
		};

		match current_segment {
			| TopicPatternItem::Str(s) => {
				let child_node =
					self.exact_children.get_mut(s).ok_or_else(|| {
						TopicMatcherError::unknown_pattern(s.as_str())
					})?;
				if child_node.update_node(rest_segments, f)? {
					self.exact_children.remove(s);
				}
			}
			| TopicPatternItem::Plus => {
				let child_node = self
					.single_level_wildcard_node
					.as_mut()
					.ok_or_else(|| TopicMatcherError::unknown_pattern("+"))?;
				if child_node.update_node(rest_segments, f)? {
					self.single_level_wildcard_node = None;
				}
			}
			| TopicPatternItem::Hash => {
				let hash_wildcard_data = self
					.multi_level_wildcard_data
					.as_mut()
					.ok_or_else(|| TopicMatcherError::unknown_pattern("#"))?;
				f(hash_wildcard_data);
				if hash_wildcard_data.is_empty() {
					self.multi_level_wildcard_data = None;
				}
			}
		}
		Ok(self.is_empty())
	}

	/// Recursively collects all subscription data that matches the given topic path segments
	fn collect_matching_subscriptions<'a>(
		&'a self,
		topic: &[Substr],
		matching_data: &mut Vec<&'a T>,
	) {
		// # wildcard matches the remainder of the path, including nothing
		self.multi_level_wildcard_data
			.iter()
			.for_each(|hash_data| matching_data.push(hash_data));
		match topic {
			| [] => {
				// At end of path, collect data from this node if present
				self.exact_match_data
					.iter()
					.for_each(|data| matching_data.push(data));
			}
			| [segment, remaining_segments @ ..] => {
				// Check for exact segment match
				if let Some(child) = self.exact_children.get(segment) {
					child.collect_matching_subscriptions(
						remaining_segments,
						matching_data,
					);
				}
				// Check for + wildcard match (matches any single segment)
				self.single_level_wildcard_node
					.iter()
					.for_each(|plus_node| {
						plus_node.collect_matching_subscriptions(
							remaining_segments,
							matching_data,
						)
					});
			}
		}
	}

	/// Finds all subscription data entries matching the given topic path
	pub fn find_by_path<'a>(&'a self, topic: &TopicPath) -> Vec<&'a T> {
		let mut matching_subscribers = Vec::new();
		self.collect_matching_subscriptions(
			&topic.segments,
			&mut matching_subscribers,
		);
		matching_subscribers
	}
}
