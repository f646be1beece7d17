use crate::handler::PubsubFunction;
use crate::handlers;
use crate::sink::LogSink;
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, warn};

/// Accepts connections until the listener fails and serves every one of them on a separate task,
/// so deliveries are processed concurrently.
pub async fn serve<S>(listener: TcpListener, function: Arc<PubsubFunction<S>>) -> std::io::Result<()>
where
    S: LogSink + 'static,
{
    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let function = function.clone();

        // Spawn a tokio task to serve multiple connections concurrently
        tokio::task::spawn(async move {
            // `service_fn` comes from Tower, it converts the handler function into a service
            let service = service_fn(move |req| trigger_handler(req, function.clone()));
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                debug!("TCP error: {:?}", err);
            }
        });
    }
}

/// Routes the request. Deliveries are only accepted as `POST /`.
async fn trigger_handler<S: LogSink>(
    req: Request<Incoming>,
    function: Arc<PubsubFunction<S>>,
) -> Result<Response<BoxBody<Bytes, hyper::Error>>, hyper::Error> {
    debug!("Request: {} {:?}", req.method(), req.uri());

    if req.uri().path() != "/" {
        warn!("Unknown path: {:?}", req.uri());
        return Ok(handlers::status(StatusCode::NOT_FOUND));
    }

    if req.method() != Method::POST {
        warn!("Invalid method: {}", req.method());
        return Ok(handlers::status(StatusCode::METHOD_NOT_ALLOWED));
    }

    Ok(handlers::invocation::handler(req, &function).await)
}
