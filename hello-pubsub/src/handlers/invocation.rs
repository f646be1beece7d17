use super::{status, text};
use crate::envelope::{headers as ce, CloudEvent, MessagePublishedData, MESSAGE_PUBLISHED_TYPE, SPEC_VERSION};
use crate::error::EnvelopeError;
use crate::handler::PubsubFunction;
use crate::sink::LogSink;
use http_body_util::{combinators::BoxBody, BodyExt};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderMap, CONTENT_TYPE};
use hyper::{Error, Request, Response, StatusCode};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Handles a single delivery pushed by the platform.
/// 204 acknowledges the message, 500 makes the platform redeliver it later.
///
/// 400 goes back for requests that are not Pub/Sub deliveries. The platform treats it as a failure
/// and redelivers the same as with 500, but the distinction is useful in the logs.
pub(crate) async fn handler<S: LogSink>(
    req: Request<Incoming>,
    function: &PubsubFunction<S>,
) -> Response<BoxBody<Bytes, Error>> {
    let (parts, body) = req.into_parts();

    let body = match body.collect().await {
        Ok(v) => v.to_bytes(),
        Err(e) => {
            warn!("Failed to read the request body: {:?}", e);
            return status(StatusCode::BAD_REQUEST);
        }
    };

    let event = match parse_event(&parts.headers, &body) {
        Ok(v) => v,
        Err(e) => {
            warn!("Not a Pub/Sub delivery: {e}");
            debug!("Request body:\n{}", String::from_utf8_lossy(&body));
            return text(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    debug!("Delivery {} of message {}", event.id, event.message_id());

    match function.invoke(&event).await {
        Ok(()) => status(StatusCode::NO_CONTENT),
        Err(e) => {
            error!("Invocation {} failed: {e}", event.id);
            text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Extracts the envelope from the request in any of the forms the platform uses:
/// - CloudEvents binary mode: attributes in `ce-*` headers, `data` in the body
/// - CloudEvents structured mode: the entire event in the body
/// - a push subscription body: `{"message": {...}, "subscription": "..."}` without any event attributes
pub(crate) fn parse_event(headers: &HeaderMap, body: &[u8]) -> Result<CloudEvent, EnvelopeError> {
    let is_structured = header(headers, CONTENT_TYPE.as_str())
        .is_some_and(|v| v.starts_with(ce::STRUCTURED_CONTENT_TYPE));

    let event = if headers.contains_key(ce::ID) {
        let required = |name: &'static str| header(headers, name).ok_or(EnvelopeError::MissingHeader(name));

        CloudEvent {
            id: required(ce::ID)?,
            event_type: required(ce::TYPE)?,
            source: required(ce::SOURCE)?,
            specversion: required(ce::SPEC_VERSION)?,
            time: header(headers, ce::TIME),
            data: serde_json::from_slice(body)?,
        }
    } else if is_structured {
        serde_json::from_slice::<CloudEvent>(body)?
    } else {
        // push subscriptions only have the message ID to identify the delivery
        let data: MessagePublishedData = serde_json::from_slice(body)?;
        CloudEvent {
            id: data
                .message
                .message_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            event_type: MESSAGE_PUBLISHED_TYPE.to_owned(),
            source: data
                .subscription
                .as_deref()
                .map(|v| format!("//pubsub.googleapis.com/{v}"))
                .unwrap_or_default(),
            specversion: SPEC_VERSION.to_owned(),
            time: data.message.publish_time.clone(),
            data,
        }
    };

    if event.specversion != SPEC_VERSION {
        return Err(EnvelopeError::SpecVersion(event.specversion));
    }

    if event.event_type != MESSAGE_PUBLISHED_TYPE {
        warn!("Unexpected event type {}, processing it as a Pub/Sub message", event.event_type);
    }

    Ok(event)
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    const DATA: &str = r#"{"message":{"data":"V29ybGQ=","messageId":"42"},"subscription":"projects/p/subscriptions/s"}"#;

    fn binary_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ce::ID, HeaderValue::from_static("delivery-1"));
        headers.insert(ce::TYPE, HeaderValue::from_static(MESSAGE_PUBLISHED_TYPE));
        headers.insert(ce::SOURCE, HeaderValue::from_static("//pubsub.googleapis.com/projects/p/topics/t"));
        headers.insert(ce::SPEC_VERSION, HeaderValue::from_static("1.0"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    #[test]
    fn binary_mode() {
        let event = parse_event(&binary_headers(), DATA.as_bytes()).unwrap();
        assert_eq!(event.id, "delivery-1");
        assert_eq!(event.message_id(), "42");
        assert_eq!(event.data.message.data.as_deref(), Some("V29ybGQ="));
        assert!(event.time.is_none());
    }

    #[test]
    fn binary_mode_requires_all_attributes() {
        let mut headers = binary_headers();
        headers.remove(ce::SOURCE);
        assert!(matches!(
            parse_event(&headers, DATA.as_bytes()),
            Err(EnvelopeError::MissingHeader(ce::SOURCE))
        ));
    }

    #[test]
    fn structured_mode() {
        let body = format!(
            r#"{{"id":"delivery-2","type":"{MESSAGE_PUBLISHED_TYPE}","source":"//pubsub.googleapis.com/projects/p/topics/t","specversion":"1.0","data":{DATA}}}"#
        );
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/cloudevents+json; charset=utf-8"),
        );

        let event = parse_event(&headers, body.as_bytes()).unwrap();
        assert_eq!(event.id, "delivery-2");
        assert_eq!(event.message_id(), "42");
    }

    #[test]
    fn push_body() {
        let event = parse_event(&HeaderMap::new(), DATA.as_bytes()).unwrap();
        assert_eq!(event.id, "42");
        assert_eq!(event.event_type, MESSAGE_PUBLISHED_TYPE);
        assert_eq!(event.source, "//pubsub.googleapis.com/projects/p/subscriptions/s");
    }

    #[test]
    fn push_body_without_message_id_gets_an_id() {
        let event = parse_event(&HeaderMap::new(), br#"{"message":{}}"#).unwrap();
        assert!(!event.id.is_empty());
        assert!(event.data.message.data.is_none());
    }

    #[test]
    fn rejects_other_spec_versions() {
        let mut headers = binary_headers();
        headers.insert(ce::SPEC_VERSION, HeaderValue::from_static("0.3"));
        assert!(matches!(
            parse_event(&headers, DATA.as_bytes()),
            Err(EnvelopeError::SpecVersion(_))
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_event(&HeaderMap::new(), b"Hello"),
            Err(EnvelopeError::Json(_))
        ));
        assert!(matches!(
            parse_event(&binary_headers(), b"{}"),
            Err(EnvelopeError::Json(_))
        ));
    }
}
