use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The event type Pub/Sub uses for every published message.
pub const MESSAGE_PUBLISHED_TYPE: &str = "google.cloud.pubsub.topic.v1.messagePublished";

/// The only CloudEvents version the trigger understands.
pub const SPEC_VERSION: &str = "1.0";

/// Header names of the CloudEvents HTTP binary content mode.
pub mod headers {
    pub const ID: &str = "ce-id";
    pub const TYPE: &str = "ce-type";
    pub const SOURCE: &str = "ce-source";
    pub const SPEC_VERSION: &str = "ce-specversion";
    pub const TIME: &str = "ce-time";
    /// Content type of a CloudEvent sent in structured mode
    pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";
}

/// A single delivery attempt of a Pub/Sub message as the function sees it.
/// A new envelope with a new `id` is created for every attempt, so a redelivered message
/// arrives with the same `data.message.message_id` but a different `id`.
///
/// ```json
/// {
///   "id": "2070443601311540",
///   "type": "google.cloud.pubsub.topic.v1.messagePublished",
///   "source": "//pubsub.googleapis.com/projects/my-project/topics/hello-topic",
///   "specversion": "1.0",
///   "time": "2024-06-11T01:22:21.165Z",
///   "data": {
///     "message": { "data": "V29ybGQ=", "messageId": "2070443601311540", "publishTime": "2024-06-11T01:22:21.165Z" },
///     "subscription": "projects/my-project/subscriptions/hello-topic-sub"
///   }
/// }
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CloudEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    pub specversion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub data: MessagePublishedData,
}

/// The payload of a `messagePublished` event.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MessagePublishedData {
    pub message: PubsubMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
}

/// A Pub/Sub message as it travels on the wire. `data` is base64 encoded and may be absent.
/// Push deliveries also carry snake_case duplicates of some fields, e.g. `message_id`. They are ignored.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PubsubMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
    #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(rename = "publishTime", default, skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<String>,
    #[serde(rename = "orderingKey", default, skip_serializing_if = "Option::is_none")]
    pub ordering_key: Option<String>,
}

impl PubsubMessage {
    /// Builds a message the way the publisher API does: the bytes are base64 encoded,
    /// a message ID and the publish time are assigned.
    /// An empty attribute map is not sent at all.
    pub fn publish(data: Option<&[u8]>, attributes: BTreeMap<String, String>) -> Self {
        Self {
            data: data.map(|v| STANDARD.encode(v)),
            attributes: if attributes.is_empty() { None } else { Some(attributes) },
            message_id: Some(Uuid::new_v4().simple().to_string()),
            publish_time: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            ordering_key: None,
        }
    }
}

impl CloudEvent {
    /// Wraps the message into a new envelope for a single delivery attempt.
    /// * topic: full resource name, e.g. `projects/my-project/topics/hello-topic`
    pub fn message_published(topic: &str, subscription: Option<&str>, message: PubsubMessage) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: MESSAGE_PUBLISHED_TYPE.to_owned(),
            source: format!("//pubsub.googleapis.com/{topic}"),
            specversion: SPEC_VERSION.to_owned(),
            time: message.publish_time.clone(),
            data: MessagePublishedData {
                message,
                subscription: subscription.map(str::to_owned),
            },
        }
    }

    /// Logical message ID, the same for all delivery attempts of the message.
    pub fn message_id(&self) -> &str {
        self.data.message.message_id.as_deref().unwrap_or_default()
    }
}
