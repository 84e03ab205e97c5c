//! Response side of a stub.

use bytes::Bytes;
use hyper::StatusCode;
use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;

/// Canned response returned for a matched request.
#[derive(Debug, Clone, Serialize)]
pub struct StubResponse {
    #[serde(serialize_with = "serialize_status")]
    pub(crate) status: StatusCode,
    pub(crate) headers: Vec<(String, String)>,
    #[serde(skip)]
    pub(crate) body: Bytes,
    #[serde(
        rename = "latency",
        serialize_with = "serialize_latency",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) latency: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) file: Option<PathBuf>,
}

impl StubResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Headers in configuration order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Delay to apply before the response is returned.
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    pub fn file(&self) -> Option<&PathBuf> {
        self.file.as_ref()
    }
}

fn serialize_status<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u16(status.as_u16())
}

fn serialize_latency<S: Serializer>(
    latency: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match latency {
        Some(latency) => serializer.serialize_u64(latency.as_millis() as u64),
        None => serializer.serialize_none(),
    }
}
