//! Connection lifecycle
//!
//! One background task, the connection manager, owns the link to the
//! broker, the subscription registry and the reconnect timer. Clients talk
//! to it through commands; [`MqttConnection`] is the handle that stops it.

pub mod error;
pub(crate) mod manager;
pub mod reconnect;
pub mod state;

use tracing::{error, warn};

pub use error::{ConnectionError, EndpointFailure};
pub(crate) use manager::{
	ConnectionManagerActor, ConnectionManagerController,
	ConnectionManagerHandler,
};
pub use reconnect::ReconnectPolicy;
pub use state::ConnectionState;

use crate::client::MqttClientError;

/// Lifecycle handle of the connection manager task
///
/// Keep it alive for as long as the client is used. Dropping it stops the
/// manager, after which every client call fails or returns false.
pub struct MqttConnection {
	controller: Option<ConnectionManagerController>,
}

impl MqttConnection {
	pub(crate) fn new(controller: ConnectionManagerController) -> Self {
		Self {
			controller: Some(controller),
		}
	}

	/// Gracefully shuts the manager down:
	/// 1. Cancels any reconnect timer or in-flight attempt
	/// 2. Withdraws every pattern from the broker and closes the link
	/// 3. Waits for the manager task to finish
	pub async fn shutdown(mut self) -> Result<(), MqttClientError> {
		match self.controller.take() {
			| Some(controller) => controller.shutdown().await?,
			| None => warn!("No connection manager controller available for shutdown"),
		}
		Ok(())
	}
}

impl Drop for MqttConnection {
	fn drop(&mut self) {
		if self.controller.is_some() {
			error!(
				"MqttConnection dropped without calling shutdown(). Please \
				 call shutdown() and await its completion before dropping."
			);
		}
	}
}
