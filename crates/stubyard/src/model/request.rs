//! Request side of a stub.

use super::pattern::PatternValue;
use bytes::Bytes;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Expected request entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyPattern {
    /// Text compared literally or as a regex against the decoded entity.
    Text(PatternValue),
    /// Raw bytes compared byte-for-byte.
    Binary(Bytes),
}

impl BodyPattern {
    pub fn is_match(&self, body: &[u8]) -> bool {
        match self {
            BodyPattern::Text(pattern) => pattern.is_match(&String::from_utf8_lossy(body)),
            BodyPattern::Binary(expected) => expected.as_ref() == body,
        }
    }
}

/// Request pattern of a stub.
///
/// Built only by the loader. `methods` is never empty and `url` is always
/// set.
#[derive(Debug, Clone, Serialize)]
pub struct StubRequest {
    pub(crate) methods: BTreeSet<String>,
    pub(crate) url: String,
    #[serde(skip)]
    pub(crate) path: PatternValue,
    pub(crate) query: BTreeMap<String, PatternValue>,
    /// Keys are lowercase.
    pub(crate) headers: BTreeMap<String, PatternValue>,
    #[serde(skip)]
    pub(crate) post: Option<BodyPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) file: Option<PathBuf>,
}

impl StubRequest {
    pub fn methods(&self) -> &BTreeSet<String> {
        &self.methods
    }

    /// URL as configured, including any query string.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> &PatternValue {
        &self.path
    }

    /// Query constraints, including those split out of the URL.
    pub fn query(&self) -> &BTreeMap<String, PatternValue> {
        &self.query
    }

    pub fn headers(&self) -> &BTreeMap<String, PatternValue> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&PatternValue> {
        self.headers.get(&name.to_ascii_lowercase())
    }

    pub fn post(&self) -> Option<&BodyPattern> {
        self.post.as_ref()
    }

    /// File the post body was loaded from, if any.
    pub fn file(&self) -> Option<&PathBuf> {
        self.file.as_ref()
    }
}
