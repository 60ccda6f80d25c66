use std::marker::PhantomData;

use arcstr::ArcStr;
use serde::Serialize;

use super::async_client::MqttClient;
use super::error::MqttClientError;
use crate::payload::OutboundPayload;

/// Publisher of JSON-serialized `T` values on a fixed topic.
pub struct MqttPublisher<T> {
	client: MqttClient,
	topic: ArcStr,
	_phantom: PhantomData<fn(&T)>,
}

impl<T> Clone for MqttPublisher<T> {
	fn clone(&self) -> Self {
		Self {
			client: self.client.clone(),
			topic: self.topic.clone(),
			_phantom: PhantomData,
		}
	}
}

impl<T> MqttPublisher<T>
where T: Serialize
{
	pub(crate) fn new(client: MqttClient, topic: ArcStr) -> Self {
		Self {
			client,
			topic,
			_phantom: PhantomData,
		}
	}

	pub fn topic(&self) -> &str {
		&self.topic
	}

	/// Publishes `data`.
	///
	/// Fails only when `data` cannot be serialized; otherwise returns
	/// whether the message was handed to the link.
	pub async fn publish(&self, data: &T) -> Result<bool, MqttClientError> {
		let payload = OutboundPayload::json(data)?;
		Ok(self.client.publish(self.topic.clone(), payload).await)
	}
}
