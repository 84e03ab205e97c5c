//! Response resolution.
//!
//! Turns a matched record into the response to send: picks the response
//! (advancing the rotation for sequences), waits out any configured latency
//! and applies the standard header policy.

use crate::repository::StubMatch;
use crate::request::IncomingRequest;
use bytes::Bytes;
use hyper::StatusCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const SERVER_HEADER: &str = concat!("stubyard/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_CONTENT_TYPE: &str = "text/html;charset=UTF-8";

/// Headers sent on every stub portal response unless a stub overrides them.
const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("Server", SERVER_HEADER),
    ("Content-Type", DEFAULT_CONTENT_TYPE),
    ("Cache-Control", "no-cache, no-store, must-revalidate"),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
];

/// A fully resolved response, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseOutput {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ResponseOutput {
    /// Build a response with the default headers, letting `headers` override
    /// any of them by name (case-insensitive).
    pub fn new(status: StatusCode, headers: &[(String, String)], body: Bytes) -> Self {
        let mut merged: Vec<(String, String)> = DEFAULT_HEADERS
            .iter()
            .filter(|(name, _)| !headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        merged.extend(headers.iter().cloned());

        Self {
            status,
            headers: merged,
            body,
        }
    }

    /// The diagnostic answer for a request no stub matched.
    pub fn not_found(request: &IncomingRequest) -> Self {
        let body = format!(
            "No data found for {} request at URI {}",
            request.method(),
            request_uri(request)
        );
        Self::new(StatusCode::NOT_FOUND, &[], Bytes::from(body))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Outcome of resolving a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Ready(ResponseOutput),
    /// The request was abandoned while waiting out the response latency
    Cancelled,
}

/// Stateless resolver; rotation state lives on each record.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseResolver;

impl ResponseResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `matched` for `request`.
    ///
    /// Latency is awaited without holding any shared lock. If `cancel` fires
    /// first, the wait is abandoned and `Resolution::Cancelled` is returned.
    pub async fn resolve(
        &self,
        matched: &StubMatch,
        request: &IncomingRequest,
        cancel: &CancellationToken,
    ) -> Resolution {
        let record = matched.record();
        let (index, response) = record.responses().next();
        debug!(
            "Resolving {} with stub {} response {}",
            request,
            record.id(),
            index
        );

        if let Some(latency) = response.latency().filter(|d| !d.is_zero()) {
            if !wait(latency, cancel).await {
                debug!("Request {} abandoned during {:?} latency", request, latency);
                return Resolution::Cancelled;
            }
        }

        Resolution::Ready(ResponseOutput::new(
            response.status(),
            response.headers(),
            response.body().clone(),
        ))
    }
}

/// Sleep for `latency`; false if cancelled first.
async fn wait(latency: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(latency) => true,
        _ = cancel.cancelled() => false,
    }
}

fn request_uri(request: &IncomingRequest) -> String {
    if request.query().is_empty() {
        return request.path().to_string();
    }
    let query: Vec<String> = request
        .query()
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    format!("{}?{}", request.path(), query.join("&"))
}
