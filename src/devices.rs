//! Door-lock deployment conventions
//!
//! Topic layout and payloads shared by the console, the backend and the
//! devices:
//!
//! | topic                          | direction        | payload            |
//! |--------------------------------|------------------|--------------------|
//! | `doorlock/<id>/control`        | console → device | [`DoorCommand`]    |
//! | `buzzer/<id>/control`          | console → device | [`BuzzerCommand`]  |
//! | `doorlock/<id>/status/<part>`  | device → console | `{"status": ...}`  |
//! | `attendance/#`, `alarms/#`     | backend → console| event JSON         |

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload::{InboundMessage, Payload};
use crate::topic::{TopicPath, TopicPatternPath};

/// Attendance events
pub const ATTENDANCE_PATTERN: &str = "attendance/#";
/// Alarm events
pub const ALARMS_PATTERN: &str = "alarms/#";
/// Device status reports without a device id
pub const DOORLOCK_STATUS_PATTERN: &str = "doorlock/status/#";
/// Firmware and configuration updates
pub const SYSTEM_UPDATE_TOPIC: &str = "system/update";
/// Status reports of every device, with device id and part captured
pub const DEVICE_STATUS_PATTERN: &str = "doorlock/+/status/+";

/// Patterns the console listens on.
pub const RESERVED_PATTERNS: [&str; 4] = [
	ATTENDANCE_PATTERN,
	ALARMS_PATTERN,
	DOORLOCK_STATUS_PATTERN,
	SYSTEM_UPDATE_TOPIC,
];

/// Value of `source` in commands sent by this client
pub const COMMAND_SOURCE: &str = "webapp";

/// Control topic of one lock
pub fn door_control_topic(device_id: &str) -> String {
	format!("doorlock/{device_id}/control")
}

/// Control topic of one buzzer
pub fn buzzer_control_topic(device_id: &str) -> String {
	format!("buzzer/{device_id}/control")
}

/// Topic on which a device reports the status of `part`
pub fn device_status_topic(device_id: &str, part: DevicePart) -> String {
	format!("doorlock/{device_id}/status/{part}")
}

/// Hardware part reporting its own status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum DevicePart {
	Door,
	Reader,
	Pinpad,
	Buzzer,
}

impl DevicePart {
	/// Name used in topics
	pub fn as_str(self) -> &'static str {
		match self {
			| DevicePart::Door => "door",
			| DevicePart::Reader => "reader",
			| DevicePart::Pinpad => "pinpad",
			| DevicePart::Buzzer => "buzzer",
		}
	}
}

impl fmt::Display for DevicePart {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Lock command verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum DoorAction {
	Lock,
	Unlock,
}

/// Payload of `doorlock/<id>/control`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct DoorCommand {
	pub command: DoorAction,
	pub source: String,
}

impl DoorCommand {
	/// Command stamped with [`COMMAND_SOURCE`]
	pub fn new(command: DoorAction) -> Self {
		Self {
			command,
			source: COMMAND_SOURCE.to_string(),
		}
	}

	#[allow(missing_docs)]
	pub fn unlock() -> Self {
		Self::new(DoorAction::Unlock)
	}

	#[allow(missing_docs)]
	pub fn lock() -> Self {
		Self::new(DoorAction::Lock)
	}
}

/// Buzzer command verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum BuzzerAction {
	On,
	Off,
}

/// Payload of `buzzer/<id>/control`. `duration` is in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct BuzzerCommand {
	pub command: BuzzerAction,
	pub duration: u32,
	pub source: String,
}

impl BuzzerCommand {
	/// Default ring time of the console's buzzer toggle
	pub const DEFAULT_DURATION: u32 = 30;

	/// Rings for `duration` seconds
	pub fn on(duration: u32) -> Self {
		Self {
			command: BuzzerAction::On,
			duration,
			source: COMMAND_SOURCE.to_string(),
		}
	}

	/// Silences the buzzer
	pub fn off() -> Self {
		Self {
			command: BuzzerAction::Off,
			duration: 0,
			source: COMMAND_SOURCE.to_string(),
		}
	}
}

/// Status report decoded from a status topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
	/// Device id, absent on `doorlock/status/<part>` topics
	pub device: Option<String>,
	/// Part name as found in the topic, e.g. `door` or `door1`
	pub part: String,
	/// Reported status, e.g. `Open`, `Closed`, `Connected`
	pub status: String,
}

impl DeviceStatus {
	/// Decodes a status message.
	///
	/// Accepts `doorlock/<id>/status/<part>` and `doorlock/status/<part>`.
	/// The status comes from a `{"status": ...}` object or, failing that,
	/// from the payload text itself. Returns `None` for other topics and
	/// for empty payloads.
	pub fn from_message(message: &InboundMessage) -> Option<Self> {
		let (device, part) = status_topic_parts(&message.topic)?;
		let status = status_text(&message.payload)?;
		Some(Self {
			device,
			part,
			status,
		})
	}

	/// Parsed [`part`](Self::part), when it names a known part.
	pub fn known_part(&self) -> Option<DevicePart> {
		serde_json::from_value(Value::String(self.part.clone())).ok()
	}
}

fn status_topic_parts(topic: &str) -> Option<(Option<String>, String)> {
	let path = Arc::new(TopicPath::new(topic));
	let per_device = TopicPatternPath::new(DEVICE_STATUS_PATTERN).ok()?;
	if let Some(captures) = per_device.captures(Arc::clone(&path)) {
		let device = captures.get_param(0)?;
		let part = captures.get_param(1)?;
		return Some((Some(device.to_string()), part.to_string()));
	}
	let shared = TopicPatternPath::new("doorlock/status/+").ok()?;
	let captures = shared.captures(path)?;
	Some((None, captures.get_param(0)?.to_string()))
}

fn status_text(payload: &Payload) -> Option<String> {
	let text = match payload {
		| Payload::Parsed(Value::Object(map)) => match map.get("status")? {
			| Value::String(status) => status.clone(),
			| other => other.to_string(),
		},
		| Payload::Parsed(Value::String(status)) => status.clone(),
		| Payload::Parsed(other) => other.to_string(),
		| Payload::Raw(text) => text.trim().to_string(),
	};
	(!text.is_empty()).then_some(text)
}
