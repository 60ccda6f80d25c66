//! Topic handling module
//!
//! This module provides components for working with MQTT topic patterns,
//! including parsing, matching, and routing messages based on topic patterns.

// Submodules
pub mod error;
pub mod topic_match;
pub mod topic_matcher;
pub mod topic_pattern_item;
/// Topic pattern parsing and matching
pub mod topic_pattern_path;
pub mod topic_router;


// Re-export commonly used types for convenience
// Re-export constants and validation utilities
pub use error::{limits, validation};
pub use topic_match::{TopicMatch, TopicPath};
pub use topic_matcher::{TopicMatcherError, matches};
pub use topic_pattern_item::{TopicPatternError, TopicPatternItem};
pub use topic_pattern_path::TopicPatternPath;
pub use topic_router::{SubscriptionId, TopicRouter, TopicRouterError};
