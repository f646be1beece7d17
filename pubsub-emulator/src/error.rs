use hello_pubsub::HandlerError;
use std::time::Duration;
use thiserror::Error;

/// A single failed delivery attempt. The message is redelivered until it runs out of attempts.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The function ran in-process and returned an error
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error("push endpoint responded with {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("push request failed: {0}")]
    Transport(String),
    #[error("no acknowledgement within {0:?}")]
    DeadlineExceeded(Duration),
}

/// Invalid env vars or command line arguments.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value of {name} env var: {value}. {hint}")]
    InvalidVar {
        name: &'static str,
        value: String,
        hint: &'static str,
    },
    #[error("invalid topic {0}. Expected projects/[project-id]/topics/[topic-name]")]
    InvalidTopic(String),
    #[error("unknown argument {0}. Run with --help for usage")]
    UnknownArg(String),
    #[error("{0} requires a value")]
    MissingValue(&'static str),
    #[error("invalid attribute {0}. Expected KEY=VALUE")]
    InvalidAttr(String),
    #[error("only one message can be published at a time, unexpected {0}")]
    ExtraArg(String),
    #[error("failed to read payload from {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
