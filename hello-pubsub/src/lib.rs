//! A function triggered by Pub/Sub messages. It decodes the name from the message data
//! and logs `Hello, {name}!`.
//!
//! The function is served over HTTP by [server::serve] the way the platform expects it:
//! every delivery is a POST with a CloudEvent, a 2xx response acknowledges the message
//! and anything else makes the platform redeliver it.

use std::str::FromStr;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod envelope;
pub mod error;
pub mod handler;
mod handlers;
pub mod server;
pub mod sink;

pub use envelope::{CloudEvent, MessagePublishedData, PubsubMessage};
pub use error::{DecodeError, HandlerError, SinkError};
pub use handler::{hello_pubsub, DecodePolicy, PubsubFunction, ENTRY_POINT};
pub use sink::{LogSink, MemorySink, TracingSink};

/// Shape of the log output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Single line human readable records with colors
    Compact,
    /// One JSON object per record, including the fields of the current span
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// Initializes the tracing from RUST_LOG env var if present or sets minimal logging:
/// - `default_directive` for this crate, e.g. `hello_pubsub=info`
/// - nothing from other crates
pub fn init_tracing(default_directive: &str, format: LogFormat) {
    let directive = Directive::from_str(default_directive).unwrap_or_else(|_e| LevelFilter::INFO.into());
    let filter = EnvFilter::builder().with_default_directive(directive).from_env_lossy();

    match format {
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(true)
            .with_target(false)
            .compact()
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .init(),
    }
}
