use thiserror::Error;

/// The message data is present but cannot be turned into a name.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("message data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// Keeps the decoded bytes for logging
    #[error("message data is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// The log sink did not accept the record.
#[derive(Debug, Error)]
#[error("log sink rejected the record: {0}")]
pub struct SinkError(pub String);

/// Any failure of a single invocation. It is reported back to the caller
/// so that the message is redelivered.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Invalid startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value of {name} env var: {value}. {hint}")]
    InvalidVar {
        name: &'static str,
        value: String,
        hint: &'static str,
    },
    #[error("FUNCTION_TARGET is {0}, but this binary only serves {1}")]
    UnknownTarget(String, &'static str),
}

/// The request does not carry a usable Pub/Sub envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("unsupported CloudEvents spec version: {0}")]
    SpecVersion(String),
    #[error("invalid envelope JSON: {0}")]
    Json(#[from] serde_json::Error),
}
