//! Emulates the platform side of a Pub/Sub push subscription for local debugging:
//! messages are wrapped into CloudEvents, delivered at least once, retried with exponential
//! backoff and dead-lettered when the delivery attempts run out.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod push;

pub use dispatcher::{DeliveryOutcome, Dispatcher, InProcess, RetryPolicy, Subscriber};
pub use error::{ConfigError, DeliveryError};
pub use push::PushSubscriber;
