use crate::error::DeliveryError;
use hello_pubsub::{CloudEvent, LogSink, PubsubFunction, PubsubMessage};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

/// How failed deliveries are retried.
/// The defaults are what the platform uses for a push subscription with a dead-letter topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before the message is dead-lettered, including the first one
    pub max_delivery_attempts: u32,
    pub minimum_backoff: Duration,
    pub maximum_backoff: Duration,
    /// A delivery that takes longer than this is counted as failed
    pub ack_deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_delivery_attempts: 5,
            minimum_backoff: Duration::from_secs(10),
            maximum_backoff: Duration::from_secs(600),
            ack_deadline: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// The wait after the failed `attempt` (1-based): the minimum backoff doubled for every
    /// previous failure, capped at the maximum backoff.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(31);
        self.minimum_backoff
            .saturating_mul(1 << doublings)
            .min(self.maximum_backoff)
    }
}

/// The receiving end of a subscription.
pub trait Subscriber: Send + Sync {
    /// Delivers a single envelope. Ok means the message is acknowledged.
    fn deliver(&self, event: &CloudEvent) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Calls the function directly, without HTTP in between.
pub struct InProcess<S> {
    function: Arc<PubsubFunction<S>>,
}

impl<S: LogSink> InProcess<S> {
    pub fn new(function: Arc<PubsubFunction<S>>) -> Self {
        Self { function }
    }

    pub fn function(&self) -> &PubsubFunction<S> {
        &self.function
    }
}

impl<S: LogSink> Subscriber for InProcess<S> {
    async fn deliver(&self, event: &CloudEvent) -> Result<(), DeliveryError> {
        Ok(self.function.invoke(event).await?)
    }
}

/// What eventually happened to a published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Acked { attempts: u32 },
    /// All attempts failed. The message would go to the dead-letter topic if there is one.
    DeadLettered { attempts: u32, last_error: String },
}

/// Delivers messages published to a single topic to a single subscriber.
pub struct Dispatcher<T> {
    /// E.g. projects/my-project/topics/hello-topic
    topic: String,
    /// E.g. projects/my-project/subscriptions/hello-topic-sub
    subscription: String,
    subscriber: T,
    policy: RetryPolicy,
}

impl<T: Subscriber> Dispatcher<T> {
    pub fn new(topic: String, subscription: String, subscriber: T, policy: RetryPolicy) -> Self {
        Self {
            topic,
            subscription,
            subscriber,
            policy,
        }
    }

    pub fn subscriber(&self) -> &T {
        &self.subscriber
    }

    /// Delivers the message until it is acknowledged or runs out of attempts.
    /// Every attempt gets a new envelope with its own ID. The message ID stays the same.
    /// Concurrent calls deliver their messages in no particular order.
    pub async fn publish(&self, message: PubsubMessage) -> DeliveryOutcome {
        let mut attempt = 1;

        loop {
            let event = CloudEvent::message_published(&self.topic, Some(&self.subscription), message.clone());
            info!(
                "Delivering message {} as {}, attempt {attempt} of {}",
                event.message_id(),
                event.id,
                self.policy.max_delivery_attempts
            );

            // a hung subscriber is the same as a failed one
            let result = match timeout(self.policy.ack_deadline, self.subscriber.deliver(&event)).await {
                Ok(v) => v,
                Err(_elapsed) => Err(DeliveryError::DeadlineExceeded(self.policy.ack_deadline)),
            };

            match result {
                Ok(()) => {
                    info!("Message {} acknowledged", event.message_id());
                    return DeliveryOutcome::Acked { attempts: attempt };
                }
                Err(e) if attempt >= self.policy.max_delivery_attempts => {
                    error!(
                        "Message {} dead-lettered after {attempt} attempts: {e}",
                        event.message_id()
                    );
                    return DeliveryOutcome::DeadLettered {
                        attempts: attempt,
                        last_error: e.to_string(),
                    };
                }
                Err(e) => {
                    let backoff = self.policy.backoff(attempt);
                    warn!("Delivery {} failed: {e}. Retrying in {backoff:?}", event.id);
                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
