//! JSON envelope used by the WebSocket bridge
//!
//! Outbound frames are always `{"topic": T, "payload": "<text>"}`. Inbound
//! frames are accepted in that shape and in the `{destinationName,
//! payloadString}` shape some bridges emit. An inbound `payload` may also be
//! an inline JSON value instead of a string.

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::payload::{InboundMessage, Payload};

/// Errors decoding an inbound envelope
#[derive(Debug, Error)]
pub enum WireError {
	/// Frame is not JSON or lacks a topic
	#[error("Frame is not a message envelope: {0}")]
	Malformed(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct OutboundEnvelope<'a> {
	topic: &'a str,
	payload: &'a str,
}

#[derive(Deserialize)]
struct InboundEnvelope {
	#[serde(alias = "destinationName")]
	topic: String,
	#[serde(default, alias = "payloadString")]
	payload: Value,
}

/// Encodes an outbound message as envelope text.
pub fn encode(topic: &str, payload: &str) -> String {
	// Serializing two strings cannot fail
	serde_json::to_string(&OutboundEnvelope { topic, payload })
		.unwrap_or_default()
}

/// Decodes envelope text into a topic and its raw payload text.
pub fn decode(frame: &str) -> Result<(String, String), WireError> {
	let envelope: InboundEnvelope = serde_json::from_str(frame)?;
	let payload = match envelope.payload {
		| Value::String(text) => text,
		| Value::Null => String::new(),
		| inline => inline.to_string(),
	};
	Ok((envelope.topic, payload))
}

/// Decodes envelope text straight into a normalized message.
pub fn decode_message(frame: &str) -> Result<InboundMessage, WireError> {
	let (topic, payload) = decode(frame)?;
	Ok(InboundMessage {
		topic: ArcStr::from(topic),
		payload: Payload::from_text(payload),
	})
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_encode_pre_serializes_payload() {
		let frame = encode("doorlock/D01/control", r#"{"command":"unlock"}"#);
		let value: Value = serde_json::from_str(&frame).unwrap();
		assert_eq!(
			value,
			json!({
				"topic": "doorlock/D01/control",
				"payload": "{\"command\":\"unlock\"}"
			})
		);
	}

	#[test]
	fn test_decode_topic_payload_shape() {
		let message = decode_message(
			r#"{"topic":"doorlock/status/door","payload":"{\"status\":\"open\"}"}"#,
		)
		.unwrap();
		assert_eq!(message.topic.as_str(), "doorlock/status/door");
		assert_eq!(message.payload, Payload::Parsed(json!({"status": "open"})));
	}

	#[test]
	fn test_decode_destination_name_shape() {
		let message = decode_message(
			r#"{"destinationName":"alarms/fire","payloadString":"smoke"}"#,
		)
		.unwrap();
		assert_eq!(message.topic.as_str(), "alarms/fire");
		assert_eq!(message.payload, Payload::Raw("smoke".to_string()));
	}

	#[test]
	fn test_decode_inline_json_payload() {
		let (topic, payload) =
			decode(r#"{"topic":"attendance/new","payload":{"status":"IN"}}"#)
				.unwrap();
		assert_eq!(topic, "attendance/new");
		assert_eq!(payload, r#"{"status":"IN"}"#);
	}

	#[test]
	fn test_missing_payload_is_empty() {
		let (_, payload) = decode(r#"{"topic":"system/update"}"#).unwrap();
		assert_eq!(payload, "");
	}

	#[test]
	fn test_reject_frames_without_topic() {
		assert!(decode(r#"{"payload":"x"}"#).is_err());
		assert!(decode("not json").is_err());
	}
}
