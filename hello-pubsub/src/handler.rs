use crate::envelope::CloudEvent;
use crate::error::{DecodeError, HandlerError};
use crate::sink::LogSink;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::str::FromStr;
use tracing::{debug, info_span, warn, Instrument};

/// The name the function is registered under with the platform.
pub const ENTRY_POINT: &str = "helloPubSub";

/// Used when the message has no data.
pub const DEFAULT_NAME: &str = "World";

/// What to do with a message whose data cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Log a warning and return an error so the platform retries and eventually dead-letters the message
    #[default]
    FailFast,
    /// Log a warning and greet the default name
    Fallback,
}

impl FromStr for DecodePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" | "fail-fast" => Ok(Self::FailFast),
            "fallback" => Ok(Self::Fallback),
            _ => Err(()),
        }
    }
}

/// Extracts the name from base64 encoded message data.
/// Missing and empty data both mean [DEFAULT_NAME].
pub fn decode_name(data: Option<&str>) -> Result<String, DecodeError> {
    let data = match data {
        Some(v) if !v.is_empty() => v,
        _ => return Ok(DEFAULT_NAME.to_owned()),
    };

    let bytes = STANDARD.decode(data)?;

    match String::from_utf8(bytes) {
        Ok(v) => Ok(v),
        Err(e) => {
            debug!("Non-UTF-8 message data: {}", hex::encode(e.as_bytes()));
            Err(e.into())
        }
    }
}

/// The text of the log line for the name.
pub fn greeting(name: &str) -> String {
    format!("Hello, {name}!")
}

/// Handles a single delivery: decodes the name and writes the greeting to the sink.
/// The event is only borrowed and is never modified.
/// Returns once the sink accepted the line. Any error should be reported back to the dispatcher
/// to have the message redelivered.
pub async fn hello_pubsub<S: LogSink>(event: &CloudEvent, sink: &S, policy: DecodePolicy) -> Result<(), HandlerError> {
    let name = match decode_name(event.data.message.data.as_deref()) {
        Ok(v) => v,
        Err(e) => match policy {
            DecodePolicy::FailFast => {
                warn!("Undecodable message data, the message will be retried: {e}");
                return Err(e.into());
            }
            DecodePolicy::Fallback => {
                warn!("Undecodable message data, using {DEFAULT_NAME}: {e}");
                DEFAULT_NAME.to_owned()
            }
        },
    };

    sink.write_line(&greeting(&name)).await?;

    Ok(())
}

/// The handler bound to its sink and decoding policy, ready to be invoked by the trigger server
/// or directly by a dispatcher.
#[derive(Debug)]
pub struct PubsubFunction<S> {
    sink: S,
    policy: DecodePolicy,
}

impl<S: LogSink> PubsubFunction<S> {
    pub fn new(sink: S, policy: DecodePolicy) -> Self {
        Self { sink, policy }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Runs the handler inside a span that tags all its log records with the delivery ID.
    pub async fn invoke(&self, event: &CloudEvent) -> Result<(), HandlerError> {
        let span = info_span!(
            "invocation",
            function = ENTRY_POINT,
            execution_id = %event.id,
            message_id = %event.message_id()
        );

        hello_pubsub(event, &self.sink, self.policy).instrument(span).await
    }
}
