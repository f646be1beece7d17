use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

pub(crate) mod invocation;

/// Returns an empty response body.
pub(crate) fn empty() -> BoxBody<Bytes, hyper::Error> {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

/// Returns an response body with contents of `chunk` which can be some type convertible into Bytes, e.g. &str.
pub(crate) fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, hyper::Error> {
    Full::new(chunk.into()).map_err(|never| match never {}).boxed()
}

/// A bodiless response with the given status.
pub(crate) fn status(status: StatusCode) -> Response<BoxBody<Bytes, hyper::Error>> {
    let mut resp = Response::new(empty());
    *resp.status_mut() = status;
    resp
}

/// A response with the given status and a plain text explanation.
pub(crate) fn text(status: StatusCode, msg: String) -> Response<BoxBody<Bytes, hyper::Error>> {
    let mut resp = Response::new(full(msg));
    *resp.status_mut() = status;
    resp
}
