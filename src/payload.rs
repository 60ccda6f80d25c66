//! Message payloads
//!
//! Inbound payloads are normalized once, when a frame enters the dispatcher,
//! into a [`Payload`]: parsed JSON when the text is valid JSON, the raw text
//! otherwise. Subscribers match on the variant instead of probing fields.

use std::fmt;

use arcstr::ArcStr;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Normalized payload of an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
	/// Payload text that is not valid JSON, delivered unchanged
	Raw(String),
	/// Payload text that parsed as JSON
	Parsed(Value),
}

impl Payload {
	/// Normalizes payload text: JSON if it parses, raw text otherwise.
	pub fn from_text(text: impl Into<String>) -> Self {
		let text = text.into();
		match serde_json::from_str::<Value>(&text) {
			| Ok(value) => Payload::Parsed(value),
			| Err(_) => Payload::Raw(text),
		}
	}

	/// Normalizes payload bytes, decoding them as UTF-8 (lossy) first.
	pub fn from_bytes(bytes: &[u8]) -> Self {
		Self::from_text(String::from_utf8_lossy(bytes).into_owned())
	}

	/// Returns the parsed JSON value, if any.
	pub fn as_json(&self) -> Option<&Value> {
		match self {
			| Payload::Parsed(value) => Some(value),
			| Payload::Raw(_) => None,
		}
	}

	/// Returns the raw text, if the payload was not JSON.
	pub fn as_raw(&self) -> Option<&str> {
		match self {
			| Payload::Raw(text) => Some(text),
			| Payload::Parsed(_) => None,
		}
	}

	/// Returns a string field of a JSON object payload.
	pub fn str_field(&self, name: &str) -> Option<&str> {
		self.as_json()?.get(name)?.as_str()
	}

	/// Deserializes a parsed payload into `T`.
	pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
		match self {
			| Payload::Parsed(value) => T::deserialize(value),
			| Payload::Raw(text) => serde_json::from_str(text),
		}
	}
}

impl fmt::Display for Payload {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			| Payload::Raw(text) => write!(f, "{text}"),
			| Payload::Parsed(value) => write!(f, "{value}"),
		}
	}
}

/// Message delivered to subscription callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
	/// Concrete topic the message was published on
	pub topic: ArcStr,
	/// Normalized payload
	pub payload: Payload,
}

impl InboundMessage {
	/// Creates a message from a topic and payload bytes.
	pub fn new(topic: impl Into<ArcStr>, payload: &[u8]) -> Self {
		Self {
			topic: topic.into(),
			payload: Payload::from_bytes(payload),
		}
	}
}

/// Payload handed to `publish`.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundPayload {
	/// Sent as-is
	Text(String),
	/// Serialized to JSON text before sending
	Json(Value),
}

impl OutboundPayload {
	/// Serializes any `Serialize` value as a JSON payload.
	pub fn json<T: Serialize + ?Sized>(
		value: &T,
	) -> Result<Self, serde_json::Error> {
		serde_json::to_value(value).map(OutboundPayload::Json)
	}

	/// Returns the wire text of this payload.
	pub fn into_text(self) -> String {
		match self {
			| OutboundPayload::Text(text) => text,
			| OutboundPayload::Json(value) => value.to_string(),
		}
	}
}

impl From<String> for OutboundPayload {
	fn from(value: String) -> Self {
		OutboundPayload::Text(value)
	}
}

impl From<&str> for OutboundPayload {
	fn from(value: &str) -> Self {
		OutboundPayload::Text(value.to_string())
	}
}

impl From<Value> for OutboundPayload {
	fn from(value: Value) -> Self {
		OutboundPayload::Json(value)
	}
}

#[cfg(test)]
mod tests {
	use serde::Deserialize;
	use serde_json::json;

	use super::*;

	#[test]
	fn test_json_text_is_parsed() {
		let payload = Payload::from_text(r#"{"status":"open"}"#);
		assert_eq!(payload, Payload::Parsed(json!({"status": "open"})));
		assert_eq!(payload.str_field("status"), Some("open"));
	}

	#[test]
	fn test_invalid_json_stays_raw() {
		let payload = Payload::from_text("OPEN");
		assert_eq!(payload, Payload::Raw("OPEN".to_string()));
		assert_eq!(payload.as_raw(), Some("OPEN"));
		assert!(payload.as_json().is_none());
		assert_eq!(payload.str_field("status"), None);
	}

	#[test]
	fn test_invalid_utf8_is_decoded_lossily() {
		let payload = Payload::from_bytes(&[b'o', 0xff, b'k']);
		assert_eq!(payload.as_raw(), Some("o\u{fffd}k"));
	}

	#[test]
	fn test_deserialize_typed() {
		#[derive(Deserialize, Debug, PartialEq)]
		struct Status {
			status: String,
		}

		let payload = Payload::from_text(r#"{"status":"closed"}"#);
		assert_eq!(
			payload.deserialize::<Status>().unwrap(),
			Status {
				status: "closed".to_string()
			}
		);
		assert!(Payload::from_text("closed").deserialize::<Status>().is_err());
	}

	#[test]
	fn test_outbound_text() {
		assert_eq!(OutboundPayload::from("ping").into_text(), "ping");
		assert_eq!(
			OutboundPayload::from(json!({"command": "unlock"})).into_text(),
			r#"{"command":"unlock"}"#
		);
	}
}
