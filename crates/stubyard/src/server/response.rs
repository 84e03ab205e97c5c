//! Response building shared by both portals.

use crate::resolver::ResponseOutput;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::error;

/// Error body written by the portals, e.g. `{"status":404,"error":"No stub with id 5"}`.
#[derive(Debug, Serialize)]
struct PortalError<'a> {
    status: u16,
    error: &'a str,
}

/// Assemble a response. A header hyper rejects turns it into a bare 500.
pub(crate) fn reply(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (name, value) in headers {
        builder = builder.header(name.as_ref(), value.as_ref());
    }
    builder.body(Full::new(body.into())).unwrap_or_else(|e| {
        error!("Dropping malformed {} response: {}", status, e);
        let mut response = Response::new(Full::new(Bytes::new()));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}

/// Serialize `value` as a compact JSON response.
pub(crate) fn json_reply(status: StatusCode, value: &impl Serialize) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => reply(status, [(CONTENT_TYPE.as_str(), "application/json")], body),
        Err(e) => {
            error!("Failed to serialize {} response: {}", status, e);
            reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                std::iter::empty::<(&str, &str)>(),
                Bytes::new(),
            )
        }
    }
}

pub(crate) fn error_reply(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_reply(
        status,
        &PortalError {
            status: status.as_u16(),
            error: message,
        },
    )
}

/// Read a request body to the end.
pub(crate) async fn read_body(body: Incoming) -> Result<Bytes, hyper::Error> {
    Ok(body.collect().await?.to_bytes())
}

impl From<ResponseOutput> for Response<Full<Bytes>> {
    fn from(output: ResponseOutput) -> Self {
        reply(output.status, output.headers, output.body)
    }
}
