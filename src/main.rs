//! Live monitor for the door-lock deployment
//!
//! Connects with the configuration from the environment (see
//! [`MqttClientConfig::from_env`]), subscribes to the console's topics and
//! prints every message and connection state change until Ctrl-C.
//!
//! ```bash
//! RUST_LOG=info MQTT_ENDPOINTS=ws://localhost:9001 cargo run --bin doorlock-monitor
//! ```

use smartdoor_mqtt::devices::{DEVICE_STATUS_PATTERN, DeviceStatus, RESERVED_PATTERNS};
use smartdoor_mqtt::{InboundMessage, MqttClient, MqttClientConfig};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the log subscriber
///
/// Priority (first match wins):
/// 1. If RUST_LOG_DISABLE is set - no logging
/// 2. If RUST_LOG is set - use environment configuration
/// 3. Otherwise - `info`
fn setup_tracing() {
	if std::env::var("RUST_LOG_DISABLE").is_ok() {
		return;
	}
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| "info".into());
	tracing_subscriber::registry()
		.with(filter)
		.with(
			tracing_subscriber::fmt::layer()
				.with_target(true)
				.with_thread_ids(false)
				.with_file(false)
				.with_line_number(false)
				.compact(),
		)
		.init();
}

fn print_message(message: &InboundMessage) {
	match DeviceStatus::from_message(message) {
		| Some(status) => println!(
			"[status] {} {} -> {}",
			status.device.as_deref().unwrap_or("-"),
			status.part,
			status.status
		),
		| None => println!("[{}] {}", message.topic, message.payload),
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	dotenv::dotenv().ok();
	setup_tracing();

	let config = MqttClientConfig::from_env()?;
	info!(endpoints = ?config.endpoints, transport = ?config.transport, "Starting monitor");
	let (client, connection) = MqttClient::from_config(config);

	for pattern in RESERVED_PATTERNS.into_iter().chain([DEVICE_STATUS_PATTERN]) {
		client
			.subscribe(pattern, |message| {
				print_message(message);
				Ok(())
			})
			.await?;
	}

	let mut states = client.watch_state();
	let state_printer = tokio::spawn(async move {
		while states.changed().await.is_ok() {
			let state = *states.borrow_and_update();
			println!("[connection] {state}");
		}
	});

	if let Err(err) = client.connect().await {
		error!(error = %err, "Initial connection failed");
	}

	tokio::signal::ctrl_c().await?;
	info!("Ctrl-C received, shutting down");

	client.disconnect().await;
	connection.shutdown().await?;
	state_printer.abort();
	Ok(())
}
