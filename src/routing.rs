//! Subscription registry and message fan-out
//!
//! The [`Dispatcher`] owns the pattern registry and runs callbacks for
//! inbound messages. [`MqttSubscriber`] offers the same subscriptions as an
//! async queue instead of a callback.

pub mod dispatcher;
/// Routing and subscription error types
pub mod error;
pub mod handler;
/// Channel based subscriber
pub mod subscriber;

pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::SubscriptionError;
pub use handler::{
	HandlerError, HandlerResult, MessageHandler, handler, infallible,
};
pub use subscriber::MqttSubscriber;
