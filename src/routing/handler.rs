use std::sync::Arc;

use crate::payload::InboundMessage;

/// Error a callback may report. It is logged and never propagated.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of one callback invocation.
pub type HandlerResult = Result<(), HandlerError>;

/// Callback registered for a topic pattern.
///
/// Cloning is cheap; two clones are the same callback.
pub type MessageHandler =
	Arc<dyn Fn(&InboundMessage) -> HandlerResult + Send + Sync>;

/// Wraps a closure into a [`MessageHandler`].
pub fn handler<F>(f: F) -> MessageHandler
where F: Fn(&InboundMessage) -> HandlerResult + Send + Sync + 'static {
	Arc::new(f)
}

/// Wraps an infallible closure into a [`MessageHandler`].
pub fn infallible<F>(f: F) -> MessageHandler
where F: Fn(&InboundMessage) + Send + Sync + 'static {
	Arc::new(move |message| {
		f(message);
		Ok(())
	})
}
