use crate::dispatcher::Subscriber;
use crate::error::DeliveryError;
use hello_pubsub::envelope::headers as ce;
use hello_pubsub::CloudEvent;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

/// Pushes envelopes to the function over HTTP in CloudEvents binary content mode,
/// the same way the platform's trigger does it.
/// Any 2xx response is an acknowledgement, everything else is a failed delivery.
pub struct PushSubscriber {
    /// E.g. http://127.0.0.1:8080/
    endpoint: Uri,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl PushSubscriber {
    pub fn new(endpoint: Uri) -> Self {
        Self {
            endpoint,
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }
}

impl Subscriber for PushSubscriber {
    async fn deliver(&self, event: &CloudEvent) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(&event.data).map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let mut req = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ce::ID, &event.id)
            .header(ce::TYPE, &event.event_type)
            .header(ce::SOURCE, &event.source)
            .header(ce::SPEC_VERSION, &event.specversion);
        if let Some(time) = &event.time {
            req = req.header(ce::TIME, time);
        }
        let req = req
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let resp = self
            .client
            .request(req)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = resp.status();
        debug!("Push endpoint responded with {status}");
        if status.is_success() {
            return Ok(());
        }

        // the function explains failures in the body
        let body = match resp.into_body().collect().await {
            Ok(v) => String::from_utf8_lossy(&v.to_bytes()).into_owned(),
            Err(e) => format!("unreadable body: {e}"),
        };

        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
