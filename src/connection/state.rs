use std::fmt;

/// Lifecycle state of the broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
	/// No link and nothing scheduled
	#[default]
	Disconnected,
	/// Explicit connection attempt in flight
	Connecting,
	/// Link open, messages flow
	Connected,
	/// Link lost, a retry is scheduled or in flight
	Reconnecting,
	/// Last explicit attempt failed or retries are exhausted
	Failed,
}

impl ConnectionState {
	pub fn is_connected(self) -> bool {
		self == ConnectionState::Connected
	}

	/// True while an attempt or a scheduled retry is pending.
	pub fn is_transitioning(self) -> bool {
		matches!(
			self,
			ConnectionState::Connecting | ConnectionState::Reconnecting
		)
	}
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			| ConnectionState::Disconnected => "disconnected",
			| ConnectionState::Connecting => "connecting",
			| ConnectionState::Connected => "connected",
			| ConnectionState::Reconnecting => "reconnecting",
			| ConnectionState::Failed => "failed",
		};
		f.write_str(name)
	}
}
