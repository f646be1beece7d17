use hello_pubsub::{server, DecodePolicy, MemorySink, PubsubFunction, PubsubMessage};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use pubsub_emulator::{DeliveryError, DeliveryOutcome, Dispatcher, PushSubscriber, RetryPolicy, Subscriber};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const TOPIC: &str = "projects/local-project/topics/hello-topic";
const SUBSCRIPTION: &str = "projects/local-project/subscriptions/hello-topic-sub";

/// A running function server on a random local port
struct TestServer {
    endpoint: Uri,
    sink: MemorySink,
    handle: JoinHandle<std::io::Result<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start_server(policy: DecodePolicy) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let sink = MemorySink::new();
    let function = Arc::new(PubsubFunction::new(sink.clone(), policy));

    TestServer {
        endpoint: format!("http://{addr}/").parse().unwrap(),
        sink,
        handle: tokio::spawn(server::serve(listener, function)),
    }
}

/// Retries without waiting to keep the tests fast
fn quick_policy() -> RetryPolicy {
    RetryPolicy {
        max_delivery_attempts: 2,
        minimum_backoff: Duration::ZERO,
        maximum_backoff: Duration::ZERO,
        ack_deadline: Duration::from_secs(5),
    }
}

fn dispatcher(endpoint: Uri) -> Dispatcher<PushSubscriber> {
    Dispatcher::new(
        TOPIC.to_owned(),
        SUBSCRIPTION.to_owned(),
        PushSubscriber::new(endpoint),
        quick_policy(),
    )
}

#[tokio::test]
async fn pushed_messages_are_greeted() {
    let server = start_server(DecodePolicy::FailFast).await;
    let dispatcher = dispatcher(server.endpoint.clone());

    let outcome = dispatcher
        .publish(PubsubMessage::publish(Some("Cloud Function Gen2".as_bytes()), BTreeMap::new()))
        .await;
    assert_eq!(outcome, DeliveryOutcome::Acked { attempts: 1 });

    let mut attributes = BTreeMap::new();
    attributes.insert("origin".to_owned(), "test".to_owned());
    let outcome = dispatcher.publish(PubsubMessage::publish(None, attributes)).await;
    assert_eq!(outcome, DeliveryOutcome::Acked { attempts: 1 });

    assert_eq!(server.sink.lines(), vec!["Hello, Cloud Function Gen2!", "Hello, World!"]);
}

#[tokio::test]
async fn malformed_message_is_retried_then_dead_lettered() {
    let server = start_server(DecodePolicy::FailFast).await;
    let dispatcher = dispatcher(server.endpoint.clone());

    let malformed = PubsubMessage {
        data: Some("not base64!".to_owned()),
        ..PubsubMessage::publish(None, BTreeMap::new())
    };

    match dispatcher.publish(malformed).await {
        DeliveryOutcome::DeadLettered { attempts, last_error } => {
            assert_eq!(attempts, 2);
            assert!(last_error.contains("500"), "{last_error}");
            assert!(last_error.contains("base64"), "{last_error}");
        }
        v => panic!("expected a dead-lettered message, got {v:?}"),
    }
    assert!(server.sink.lines().is_empty());
}

#[tokio::test]
async fn malformed_message_is_acked_with_fallback() {
    let server = start_server(DecodePolicy::Fallback).await;
    let dispatcher = dispatcher(server.endpoint.clone());

    let malformed = PubsubMessage {
        data: Some("not base64!".to_owned()),
        ..PubsubMessage::publish(None, BTreeMap::new())
    };

    assert_eq!(dispatcher.publish(malformed).await, DeliveryOutcome::Acked { attempts: 1 });
    assert_eq!(server.sink.lines(), vec!["Hello, World!"]);
}

#[tokio::test]
async fn unknown_path_is_rejected() {
    let server = start_server(DecodePolicy::FailFast).await;
    let endpoint: Uri = format!("{}nope", server.endpoint).parse().unwrap();

    let event = hello_pubsub::CloudEvent::message_published(
        TOPIC,
        Some(SUBSCRIPTION),
        PubsubMessage::publish(Some("World".as_bytes()), BTreeMap::new()),
    );
    let result = PushSubscriber::new(endpoint).deliver(&event).await;

    assert!(matches!(result, Err(DeliveryError::Rejected { status: 404, .. })));
    assert!(server.sink.lines().is_empty());
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    // grab a free port and release it so nothing listens there
    let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let endpoint: Uri = format!("http://{addr}/").parse().unwrap();

    let event = hello_pubsub::CloudEvent::message_published(TOPIC, None, PubsubMessage::default());
    let result = PushSubscriber::new(endpoint).deliver(&event).await;

    assert!(matches!(result, Err(DeliveryError::Transport(_))));
}

#[tokio::test]
async fn raw_push_body_and_structured_event_are_accepted() {
    let server = start_server(DecodePolicy::FailFast).await;
    let client: Client<HttpConnector, Full<Bytes>> = Client::builder(TokioExecutor::new()).build_http();

    // a push subscription body without any CloudEvents attributes
    let push = r#"{"message":{"data":"V29ybGQ=","messageId":"1","message_id":"1"},"subscription":"projects/local-project/subscriptions/hello-topic-sub"}"#;
    let req = Request::builder()
        .method(Method::POST)
        .uri(server.endpoint.clone())
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(push)))
        .unwrap();
    assert_eq!(client.request(req).await.unwrap().status(), StatusCode::NO_CONTENT);

    // the whole event in the body
    let structured = r#"{"id":"d-1","type":"google.cloud.pubsub.topic.v1.messagePublished","source":"//pubsub.googleapis.com/projects/local-project/topics/hello-topic","specversion":"1.0","data":{"message":{"data":"Wm/Dqw=="}}}"#;
    let req = Request::builder()
        .method(Method::POST)
        .uri(server.endpoint.clone())
        .header(CONTENT_TYPE, "application/cloudevents+json")
        .body(Full::new(Bytes::from(structured)))
        .unwrap();
    assert_eq!(client.request(req).await.unwrap().status(), StatusCode::NO_CONTENT);

    assert_eq!(server.sink.lines(), vec!["Hello, World!", "Hello, Zoë!"]);
}

#[tokio::test]
async fn non_deliveries_are_rejected() {
    let server = start_server(DecodePolicy::FailFast).await;
    let client: Client<HttpConnector, Full<Bytes>> = Client::builder(TokioExecutor::new()).build_http();

    let req = Request::builder()
        .method(Method::GET)
        .uri(server.endpoint.clone())
        .body(Full::new(Bytes::new()))
        .unwrap();
    assert_eq!(client.request(req).await.unwrap().status(), StatusCode::METHOD_NOT_ALLOWED);

    let req = Request::builder()
        .method(Method::POST)
        .uri(server.endpoint.clone())
        .body(Full::new(Bytes::from("Hello")))
        .unwrap();
    assert_eq!(client.request(req).await.unwrap().status(), StatusCode::BAD_REQUEST);

    assert!(server.sink.lines().is_empty());
}
