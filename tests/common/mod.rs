#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use smartdoor_mqtt::transport::MemoryConnector;
use smartdoor_mqtt::{
	ConnectionState, InboundMessage, MqttClient, MqttClientConfig,
	MqttConnection, ReconnectPolicy,
};

pub fn client(
	endpoints: &[&str],
	connector: &MemoryConnector,
) -> (MqttClient, MqttConnection) {
	client_with(endpoints, connector, ReconnectPolicy::default())
}

pub fn client_with(
	endpoints: &[&str],
	connector: &MemoryConnector,
	reconnect: ReconnectPolicy,
) -> (MqttClient, MqttConnection) {
	let config = MqttClientConfig::new(endpoints.iter().copied())
		.with_reconnect(reconnect);
	MqttClient::new(config, Arc::new(connector.clone()))
}

/// Lets spawned tasks drain their queues.
pub async fn settle() {
	tokio::time::sleep(Duration::from_millis(1)).await;
}

pub async fn wait_for_state(client: &MqttClient, state: ConnectionState) {
	let mut states = client.watch_state();
	tokio::time::timeout(Duration::from_secs(600), states.wait_for(|s| *s == state))
		.await
		.unwrap_or_else(|_| panic!("state {state} never reached"))
		.unwrap();
}

pub type Inbox = Arc<Mutex<Vec<InboundMessage>>>;

pub fn inbox() -> Inbox {
	Arc::new(Mutex::new(Vec::new()))
}

pub fn topics(inbox: &Inbox) -> Vec<String> {
	inbox.lock().unwrap().iter().map(|m| m.topic.to_string()).collect()
}
