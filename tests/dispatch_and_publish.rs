mod common;

use std::sync::Arc;

use common::{client, inbox, settle, topics};
use serde_json::{Value, json};
use smartdoor_mqtt::devices::{
	BuzzerCommand, DOORLOCK_STATUS_PATTERN, DeviceStatus, DoorCommand,
	buzzer_control_topic, door_control_topic,
};
use smartdoor_mqtt::topic::limits::MAX_TOPIC_DEPTH;
use smartdoor_mqtt::transport::{LinkCommand, MemoryConnector};
use smartdoor_mqtt::{MqttClientError, Payload};

#[tokio::test(start_paused = true)]
async fn test_publish_before_connect_returns_false() {
	let connector = MemoryConnector::new();
	let (client, connection) = client(&["ws://a"], &connector);

	assert!(!client.publish("doorlock/D01/control", "unlock").await);
	assert_eq!(connector.opened_count(), 0);

	client.connect().await.unwrap();
	assert!(client.publish("doorlock/D01/control", "unlock").await);
	settle().await;
	assert_eq!(connector.last_peer().unwrap().published(), vec![(
		"doorlock/D01/control".to_string(),
		"unlock".to_string()
	)]);

	client.disconnect().await;
	assert!(!client.publish("doorlock/D01/control", "unlock").await);

	connection.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_publish_rejects_wildcard_topics() {
	let connector = MemoryConnector::new();
	let (client, connection) = client(&["ws://a"], &connector);
	client.connect().await.unwrap();

	assert!(!client.publish("alarms/#", "x").await);
	assert!(!client.publish("", "x").await);
	settle().await;
	assert!(connector.last_peer().unwrap().published().is_empty());
	assert!(client.publisher::<DoorCommand>("doorlock/+/control").is_err());

	connection.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_publish_returns_false_when_link_refuses_frame() {
	let connector = MemoryConnector::new();
	let (client, connection) = client(&["ws://a"], &connector);
	client.connect().await.unwrap();

	let peer = connector.last_peer().unwrap();
	peer.stop_reading();
	settle().await;

	assert!(!client.publish("doorlock/D01/control", "unlock").await);
	assert!(
		!client
			.publish_json(door_control_topic("D01"), &DoorCommand::lock())
			.await
	);
	assert!(client.is_connected());
	assert!(peer.published().is_empty());

	connection.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_device_commands_are_json_encoded() {
	let connector = MemoryConnector::new();
	let (client, connection) = client(&["ws://a"], &connector);
	client.connect().await.unwrap();

	assert!(
		client
			.publish_json(door_control_topic("D01"), &DoorCommand::unlock())
			.await
	);
	let buzzer = client
		.publisher::<BuzzerCommand>(buzzer_control_topic("D01"))
		.unwrap();
	assert!(buzzer.publish(&BuzzerCommand::on(30)).await.unwrap());
	settle().await;

	let published = connector.last_peer().unwrap().published();
	assert_eq!(published.len(), 2);
	assert_eq!(published[0].0, "doorlock/D01/control");
	assert_eq!(
		serde_json::from_str::<Value>(&published[0].1).unwrap(),
		json!({"command": "unlock", "source": "webapp"})
	);
	assert_eq!(published[1].0, "buzzer/D01/control");
	assert_eq!(
		serde_json::from_str::<Value>(&published[1].1).unwrap(),
		json!({"command": "on", "duration": 30, "source": "webapp"})
	);

	connection.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_status_wildcard_delivers_parsed_json() {
	let connector = MemoryConnector::new();
	let (client, connection) = client(&["ws://a"], &connector);
	let received = inbox();
	let sink = Arc::clone(&received);
	client
		.subscribe(DOORLOCK_STATUS_PATTERN, move |message| {
			sink.lock().unwrap().push(message.clone());
			Ok(())
		})
		.await
		.unwrap();
	client.connect().await.unwrap();

	let peer = connector.last_peer().unwrap();
	peer.deliver("doorlock/status/door", r#"{"status":"open"}"#).await;
	peer.deliver("doorlock/D01/status/door", r#"{"status":"closed"}"#).await;
	settle().await;

	let received = received.lock().unwrap();
	assert_eq!(received.len(), 1);
	assert_eq!(received[0].topic.as_str(), "doorlock/status/door");
	assert_eq!(received[0].payload, Payload::Parsed(json!({"status": "open"})));
	assert_eq!(received[0].payload.str_field("status"), Some("open"));
	let status = DeviceStatus::from_message(&received[0]).unwrap();
	assert_eq!(status.part, "door");
	assert_eq!(status.status, "open");
	drop(received);

	connection.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_hash_receives_arbitrarily_deep_topics() {
	let connector = MemoryConnector::new();
	let (client, connection) = client(&["ws://a"], &connector);
	let received = inbox();
	let sink = Arc::clone(&received);
	client
		.subscribe("alarms/#", move |message| {
			sink.lock().unwrap().push(message.clone());
			Ok(())
		})
		.await
		.unwrap();
	client.connect().await.unwrap();

	let topic = format!("alarms/{}", vec!["z"; MAX_TOPIC_DEPTH].join("/"));
	connector.last_peer().unwrap().deliver(&topic, "smoke").await;
	settle().await;

	assert_eq!(topics(&received), vec![topic]);

	connection.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failing_callback_does_not_block_others() {
	let connector = MemoryConnector::new();
	let (client, connection) = client(&["ws://a"], &connector);
	let received = inbox();

	client
		.subscribe("alarms/#", |_| Err("alarm handler rejected".into()))
		.await
		.unwrap();
	client
		.subscribe("alarms/+", |_| panic!("alarm handler crashed"))
		.await
		.unwrap();
	let sink = Arc::clone(&received);
	client
		.subscribe("alarms/fire", move |message| {
			sink.lock().unwrap().push(message.clone());
			Ok(())
		})
		.await
		.unwrap();
	client.connect().await.unwrap();

	let peer = connector.last_peer().unwrap();
	peer.deliver("alarms/fire", "smoke").await;
	peer.deliver("alarms/fire", "heat").await;
	settle().await;

	let payloads: Vec<Payload> =
		received.lock().unwrap().iter().map(|m| m.payload.clone()).collect();
	assert_eq!(payloads, vec![
		Payload::Raw("smoke".to_string()),
		Payload::Raw("heat".to_string())
	]);
	assert!(client.is_connected());

	connection.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_callbacks_run_in_registration_order() {
	let connector = MemoryConnector::new();
	let (client, connection) = client(&["ws://a"], &connector);
	let order = Arc::new(std::sync::Mutex::new(Vec::new()));
	for (pattern, name) in [
		("attendance/#", "all"),
		("attendance/+", "one-level"),
		("attendance/#", "all-again"),
		("attendance/new", "exact"),
	] {
		let order = Arc::clone(&order);
		client
			.subscribe(pattern, move |_| {
				order.lock().unwrap().push(name);
				Ok(())
			})
			.await
			.unwrap();
	}
	client.connect().await.unwrap();

	connector
		.last_peer()
		.unwrap()
		.deliver("attendance/new", r#"{"status":"IN"}"#)
		.await;
	settle().await;
	assert_eq!(*order.lock().unwrap(), vec![
		"all",
		"all-again",
		"one-level",
		"exact"
	]);

	connection.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_one_then_all() {
	let connector = MemoryConnector::new();
	let (client, connection) = client(&["ws://a"], &connector);
	let received = inbox();
	let first_sink = Arc::clone(&received);
	let first = client
		.subscribe("system/update", move |m| {
			first_sink.lock().unwrap().push(m.clone());
			Ok(())
		})
		.await
		.unwrap();
	let second_sink = Arc::clone(&received);
	client
		.subscribe("system/update", move |m| {
			second_sink.lock().unwrap().push(m.clone());
			Ok(())
		})
		.await
		.unwrap();
	client.connect().await.unwrap();
	let peer = connector.last_peer().unwrap();

	assert_eq!(client.unsubscribe("system/update", Some(first)).await.unwrap(), 1);
	assert_eq!(client.unsubscribe("system/update", Some(first)).await.unwrap(), 0);
	peer.deliver("system/update", "v2").await;
	settle().await;
	assert_eq!(topics(&received), vec!["system/update"]);
	assert!(
		!peer
			.commands()
			.contains(&LinkCommand::Unsubscribe(arcstr::literal!("system/update")))
	);

	assert_eq!(client.unsubscribe("system/update", None).await.unwrap(), 1);
	settle().await;
	assert!(
		peer.commands()
			.contains(&LinkCommand::Unsubscribe(arcstr::literal!("system/update")))
	);
	peer.deliver("system/update", "v3").await;
	settle().await;
	assert_eq!(topics(&received).len(), 1);

	connection.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_malformed_pattern_is_rejected() {
	let connector = MemoryConnector::new();
	let (client, connection) = client(&["ws://a"], &connector);
	for pattern in ["alarms/#/fire", "alarms/fi+re", ""] {
		let res = client.subscribe(pattern, |_| Ok(())).await;
		assert!(
			matches!(res, Err(MqttClientError::TopicPattern(_))),
			"{pattern:?} should be rejected"
		);
	}
	connection.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_clears_subscriptions() {
	let connector = MemoryConnector::new();
	let (client, connection) = client(&["ws://a"], &connector);
	let received = inbox();
	let sink = Arc::clone(&received);
	client
		.subscribe("alarms/#", move |m| {
			sink.lock().unwrap().push(m.clone());
			Ok(())
		})
		.await
		.unwrap();
	client.connect().await.unwrap();
	client.disconnect().await;
	client.connect().await.unwrap();
	settle().await;

	let peer = connector.last_peer().unwrap();
	assert!(peer.subscribed().is_empty());
	peer.deliver("alarms/fire", "smoke").await;
	settle().await;
	assert!(received.lock().unwrap().is_empty());

	connection.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_channel_subscriber_receives_and_unsubscribes_on_drop() {
	let connector = MemoryConnector::echo();
	let (client, connection) = client(&["ws://a"], &connector);
	client.connect().await.unwrap();

	let mut subscriber = client.subscribe_channel("system/+").await.unwrap();
	assert_eq!(subscriber.pattern().as_str(), "system/+");
	assert!(client.publish("system/update", "v2").await);

	let message = subscriber.receive().await.unwrap();
	assert_eq!(message.topic.as_str(), "system/update");
	assert_eq!(message.payload, Payload::Raw("v2".to_string()));

	drop(subscriber);
	settle().await;
	let peer = connector.last_peer().unwrap();
	assert!(
		peer.commands()
			.contains(&LinkCommand::Unsubscribe(arcstr::literal!("system/+")))
	);

	connection.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_channel_subscriber_ends_on_disconnect() {
	let connector = MemoryConnector::new();
	let (client, connection) = client(&["ws://a"], &connector);
	let mut subscriber = client.subscribe_channel("alarms/#").await.unwrap();
	client.connect().await.unwrap();
	client.disconnect().await;
	assert!(subscriber.receive().await.is_none());
	connection.shutdown().await.unwrap();
}
