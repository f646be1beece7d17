use crate::dispatcher::RetryPolicy;
use crate::error::ConfigError;
use hyper::Uri;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::env::var;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080/";
const DEFAULT_TOPIC: &str = "projects/local-project/topics/hello-topic";

lazy_static! {
    /// Captures the project ID and the topic name from a full topic name
    static ref TOPIC_REGEX: Regex =
        Regex::new(r"^projects/([a-z][a-z0-9-]{4,28}[a-z0-9])/topics/([A-Za-z][A-Za-z0-9_.~+%-]{2,254})$")
            .expect("Invalid topic regex. It's a bug.");
}

pub struct Config {
    /// Where the function listens, e.g. http://127.0.0.1:8080/
    pub endpoint: Uri,
    /// E.g. projects/local-project/topics/hello-topic
    pub topic: String,
    /// E.g. projects/local-project/subscriptions/hello-topic-sub
    pub subscription: String,
    pub policy: RetryPolicy,
}

impl Config {
    /// Creates a new Config instance from environment variables and defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| var(name).ok())
    }

    /// Same as [Config::from_env], but reads the variables via `get`.
    pub(crate) fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let endpoint = get("PUBSUB_PUSH_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned());
        let endpoint = match Uri::from_str(&endpoint) {
            Ok(v) if v.scheme_str() == Some("http") => v,
            _ => {
                return Err(ConfigError::InvalidVar {
                    name: "PUBSUB_PUSH_ENDPOINT",
                    value: endpoint,
                    hint: "Must be an http URL, e.g. http://127.0.0.1:8080/",
                })
            }
        };

        let topic = get("PUBSUB_TOPIC").unwrap_or_else(|| DEFAULT_TOPIC.to_owned());
        let (project, topic_name) = match TOPIC_REGEX.captures(&topic) {
            Some(captures) => (captures[1].to_owned(), captures[2].to_owned()),
            None => return Err(ConfigError::InvalidTopic(topic)),
        };

        // one subscription per topic is all the emulator needs
        let subscription = get("PUBSUB_SUBSCRIPTION")
            .unwrap_or_else(|| format!("projects/{project}/subscriptions/{topic_name}-sub"));

        let defaults = RetryPolicy::default();
        let policy = RetryPolicy {
            max_delivery_attempts: number(&get, "PUBSUB_MAX_DELIVERY_ATTEMPTS", 5..=100, "Must be 5 to 100")?
                .unwrap_or(defaults.max_delivery_attempts),
            minimum_backoff: seconds(&get, "PUBSUB_MIN_BACKOFF_SECS", 0..=600)?.unwrap_or(defaults.minimum_backoff),
            maximum_backoff: seconds(&get, "PUBSUB_MAX_BACKOFF_SECS", 0..=600)?.unwrap_or(defaults.maximum_backoff),
            ack_deadline: number(&get, "PUBSUB_ACK_DEADLINE_SECS", 10..=600, "Must be 10 to 600 seconds")?
                .map(|v| Duration::from_secs(v.into()))
                .unwrap_or(defaults.ack_deadline),
        };

        if policy.minimum_backoff > policy.maximum_backoff {
            return Err(ConfigError::InvalidVar {
                name: "PUBSUB_MIN_BACKOFF_SECS",
                value: policy.minimum_backoff.as_secs().to_string(),
                hint: "Must not exceed PUBSUB_MAX_BACKOFF_SECS",
            });
        }

        Ok(Self {
            endpoint,
            topic,
            subscription,
            policy,
        })
    }
}

/// Reads an optional number within the range.
fn number(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    range: std::ops::RangeInclusive<u32>,
    hint: &'static str,
) -> Result<Option<u32>, ConfigError> {
    let value = match get(name) {
        Some(v) => v,
        None => return Ok(None),
    };

    match value.parse::<u32>() {
        Ok(v) if range.contains(&v) => Ok(Some(v)),
        _ => Err(ConfigError::InvalidVar { name, value, hint }),
    }
}

fn seconds(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    range: std::ops::RangeInclusive<u32>,
) -> Result<Option<Duration>, ConfigError> {
    Ok(number(get, name, range, "Must be 0 to 600 seconds")?.map(|v| Duration::from_secs(v.into())))
}

/// What the emulator was asked to do on the command line.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Publish(Publication),
}

/// A message to publish, as given on the command line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Publication {
    /// Raw message bytes. None publishes a message without data.
    pub data: Option<Vec<u8>>,
    pub attributes: BTreeMap<String, String>,
}

/// Parses the arguments that follow the binary name:
/// `[MESSAGE] [--file PATH] [--attr KEY=VALUE]...`
pub fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command, ConfigError> {
    let mut publication = Publication::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(Command::Help),
            "--file" => {
                let path = args.next().ok_or(ConfigError::MissingValue("--file"))?;
                if publication.data.is_some() {
                    return Err(ConfigError::ExtraArg(path));
                }
                let bytes = std::fs::read(&path).map_err(|source| ConfigError::ReadFile { path, source })?;
                publication.data = Some(bytes);
            }
            "--attr" => {
                let attr = args.next().ok_or(ConfigError::MissingValue("--attr"))?;
                match attr.split_once('=') {
                    Some((key, value)) if !key.is_empty() => {
                        publication.attributes.insert(key.to_owned(), value.to_owned());
                    }
                    _ => return Err(ConfigError::InvalidAttr(attr)),
                }
            }
            v if v.starts_with("--") => return Err(ConfigError::UnknownArg(arg)),
            _ => {
                if publication.data.is_some() {
                    return Err(ConfigError::ExtraArg(arg));
                }
                publication.data = Some(arg.into_bytes());
            }
        }
    }

    Ok(Command::Publish(publication))
}

/// Prints usage to stdout.
pub fn print_help() {
    println!("Publishes a message to a locally running Pub/Sub triggered function.");
    println!("1. start the function with `cargo run -p hello-pubsub`");
    println!("2. publish a message in a separate terminal with `cargo run -p pubsub-emulator -- [MESSAGE]`");
    println!();
    println!("Usage: pubsub-emulator [MESSAGE] [--file PATH] [--attr KEY=VALUE]...");
    println!("  MESSAGE           text payload, omit to publish a message without data");
    println!("  --file PATH       publish the contents of the file as is");
    println!("  --attr KEY=VALUE  add a message attribute, can be repeated");
    println!();
    println!("Env vars:");
    println!("  PUBSUB_PUSH_ENDPOINT          default {DEFAULT_ENDPOINT}");
    println!("  PUBSUB_TOPIC                  default {DEFAULT_TOPIC}");
    println!("  PUBSUB_SUBSCRIPTION           default derived from the topic");
    println!("  PUBSUB_MAX_DELIVERY_ATTEMPTS  5 to 100, default 5");
    println!("  PUBSUB_MIN_BACKOFF_SECS       0 to 600, default 10");
    println!("  PUBSUB_MAX_BACKOFF_SECS       0 to 600, default 600");
    println!("  PUBSUB_ACK_DEADLINE_SECS      10 to 600, default 10");
}
