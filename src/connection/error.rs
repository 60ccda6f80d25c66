use std::fmt;

use arcstr::ArcStr;
use thiserror::Error;

/// Why one endpoint could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointFailure {
	pub endpoint: ArcStr,
	pub reason: String,
	/// The endpoint did not answer within the per-endpoint timeout
	pub timed_out: bool,
}

impl fmt::Display for EndpointFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.endpoint, self.reason)
	}
}

fn list_failures(attempts: &[EndpointFailure]) -> String {
	attempts
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join(", ")
}

/// Errors reported to `connect()` callers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
	/// Every endpoint was tried and none accepted
	#[error("All endpoints failed: {}", list_failures(.attempts))]
	AllEndpointsFailed {
		/// One entry per endpoint, in the order they were tried
		attempts: Vec<EndpointFailure>,
	},

	/// Endpoint list is empty
	#[error("No endpoints configured")]
	NoEndpoints,

	/// `disconnect()` or shutdown cancelled the attempt
	#[error("Connection attempt aborted")]
	Aborted,

	/// Connection manager task is not running
	#[error("Connection manager is not running")]
	ManagerUnavailable,
}

impl ConnectionError {
	/// Endpoints named by an [`AllEndpointsFailed`](Self::AllEndpointsFailed)
	/// error, empty otherwise.
	pub fn endpoints(&self) -> Vec<&str> {
		match self {
			| ConnectionError::AllEndpointsFailed { attempts } => {
				attempts.iter().map(|a| a.endpoint.as_str()).collect()
			}
			| _ => Vec::new(),
		}
	}
}
