use crate::error::ConfigError;
use crate::handler::{DecodePolicy, ENTRY_POINT};
use crate::LogFormat;
use std::env::var;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// The platform sets PORT, this is what it uses if it doesn't
const DEFAULT_PORT: u16 = 8080;

pub struct Config {
    /// E.g. 0.0.0.0:8080
    pub listener: SocketAddr,
    /// What to do with messages that cannot be decoded
    pub decode_policy: DecodePolicy,
    pub log_format: LogFormat,
}

impl Config {
    /// Creates a new Config instance from environment variables.
    /// Uses default values where possible.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| var(name).ok())
    }

    /// Same as [Config::from_env], but reads the variables via `get`.
    pub(crate) fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // the platform routes the trigger to the function named in FUNCTION_TARGET
        // and there is only one function in this binary
        if let Some(target) = get("FUNCTION_TARGET") {
            if target != ENTRY_POINT {
                return Err(ConfigError::UnknownTarget(target, ENTRY_POINT));
            }
        }

        let port = match get("PORT") {
            Some(v) => v.parse::<u16>().map_err(|_e| ConfigError::InvalidVar {
                name: "PORT",
                value: v,
                hint: "Must be a valid port number, e.g. 8080",
            })?,
            None => DEFAULT_PORT,
        };

        let decode_policy = match get("HELLO_PUBSUB_DECODE_POLICY") {
            Some(v) => v.parse::<DecodePolicy>().map_err(|_e| ConfigError::InvalidVar {
                name: "HELLO_PUBSUB_DECODE_POLICY",
                value: v,
                hint: "Use fail or fallback",
            })?,
            None => DecodePolicy::default(),
        };

        // K_SERVICE is only set when running on the platform where logs are ingested as JSON
        let log_format = match get("LOG_FORMAT") {
            Some(v) => v.parse::<LogFormat>().map_err(|_e| ConfigError::InvalidVar {
                name: "LOG_FORMAT",
                value: v,
                hint: "Use compact or json",
            })?,
            None if get("K_SERVICE").is_some() => LogFormat::Json,
            None => LogFormat::Compact,
        };

        Ok(Self {
            listener: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)),
            decode_policy,
            log_format,
        })
    }
}
