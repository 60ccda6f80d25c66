//! WebSocket transport speaking the JSON envelope (see [`crate::wire`]).

use arcstr::ArcStr;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, SinkExt, StreamExt};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use super::{Connector, Link, LinkCommand, LinkEvent, TransportError};
use crate::wire;

/// Connector for `ws://` / `wss://` endpoints carrying JSON envelopes.
///
/// The envelope format has no subscription frames: the bridge forwards
/// every message and filtering happens client side, so subscribe and
/// unsubscribe commands are accepted and ignored.
#[derive(Debug, Clone)]
pub struct EnvelopeConnector {
	channel_capacity: usize,
}

impl EnvelopeConnector {
	/// Creates a connector whose link channels hold `channel_capacity` items.
	pub fn new(channel_capacity: usize) -> Self {
		Self { channel_capacity }
	}
}

impl Default for EnvelopeConnector {
	fn default() -> Self {
		Self::new(100)
	}
}

impl Connector for EnvelopeConnector {
	fn open(
		&self,
		endpoint: ArcStr,
	) -> BoxFuture<'static, Result<Link, TransportError>> {
		let capacity = self.channel_capacity;
		async move {
			if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://"))
			{
				return Err(TransportError::UnsupportedEndpoint {
					endpoint: endpoint.to_string(),
					reason: "expected ws:// or wss://".to_string(),
				});
			}
			let (ws, _response) =
				tokio_tungstenite::connect_async(endpoint.as_str()).await?;
			debug!(endpoint = %endpoint, "WebSocket handshake completed");

			let (link, command_rx, event_tx) = Link::channel(capacity);
			tokio::spawn(run_socket(endpoint, ws, command_rx, event_tx));
			Ok(link)
		}
		.boxed()
	}
}

type WsStream = tokio_tungstenite::WebSocketStream<
	tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Pumps frames between the socket and the link channels until either
/// side closes.
async fn run_socket(
	endpoint: ArcStr,
	ws: WsStream,
	mut command_rx: Receiver<LinkCommand>,
	event_tx: Sender<LinkEvent>,
) {
	let (mut sink, mut stream) = ws.split();
	let close_reason = loop {
		tokio::select! {
			cmd = command_rx.recv() => match cmd {
				| Some(LinkCommand::Publish { topic, payload }) => {
					let frame = wire::encode(&topic, &payload);
					if let Err(err) = sink.send(Message::Text(frame.into())).await {
						break Some(format!("send failed: {err}"));
					}
				}
				| Some(LinkCommand::Subscribe(pattern))
				| Some(LinkCommand::Unsubscribe(pattern)) => {
					debug!(pattern = %pattern, "Envelope transport has no subscription frames");
				}
				| Some(LinkCommand::Close) | None => {
					let _ = sink.close().await;
					debug!(endpoint = %endpoint, "WebSocket closed by client");
					return;
				}
			},
			frame = stream.next() => match frame {
				| Some(Ok(Message::Text(text))) => {
					forward_frame(&event_tx, text.as_str()).await;
				}
				| Some(Ok(Message::Binary(data))) => {
					match std::str::from_utf8(&data) {
						| Ok(text) => forward_frame(&event_tx, text).await,
						| Err(_) => warn!(
							endpoint = %endpoint,
							size = data.len(),
							"Dropping non UTF-8 binary frame"
						),
					}
				}
				| Some(Ok(Message::Ping(payload))) => {
					let _ = sink.send(Message::Pong(payload)).await;
				}
				| Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
				| Some(Ok(Message::Close(frame))) => {
					break Some(
						frame
							.map(|f| format!("closed by server: {}", f.reason))
							.unwrap_or_else(|| "closed by server".to_string()),
					);
				}
				| Some(Err(err)) => break Some(err.to_string()),
				| None => break None,
			},
		}
	};
	info!(endpoint = %endpoint, reason = ?close_reason, "WebSocket connection lost");
	let _ = event_tx.send(LinkEvent::Closed { reason: close_reason }).await;
}

async fn forward_frame(event_tx: &Sender<LinkEvent>, text: &str) {
	match wire::decode(text) {
		| Ok((topic, payload)) => {
			let event = LinkEvent::Message {
				topic,
				payload: Bytes::from(payload),
			};
			if event_tx.send(event).await.is_err() {
				debug!("Link receiver dropped, discarding frame");
			}
		}
		| Err(err) => {
			warn!(error = %err, frame_size = text.len(), "Dropping malformed frame");
		}
	}
}
