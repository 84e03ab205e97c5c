//! Configured values that match either literally or as a regular expression.

use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// A pattern value from the configuration.
///
/// Literal equality is always tried first. If the raw text contains regex
/// syntax and compiles, a full-string match against it is tried next; text
/// that does not compile is only ever compared literally.
#[derive(Clone)]
pub struct PatternValue {
    raw: String,
    regex: Option<Arc<Regex>>,
}

impl PatternValue {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let regex = if regex::escape(&raw) == raw {
            None
        } else {
            Regex::new(&format!("^(?:{raw})$")).ok().map(Arc::new)
        };
        Self { raw, regex }
    }

    /// A value that only ever matches itself, whatever characters it holds.
    pub fn literal(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            regex: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this value is also evaluated as a regex.
    pub fn is_regex(&self) -> bool {
        self.regex.is_some()
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.raw == value || self.regex.as_ref().is_some_and(|re| re.is_match(value))
    }
}

impl PartialEq for PatternValue {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for PatternValue {}

impl fmt::Debug for PatternValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternValue")
            .field("raw", &self.raw)
            .field("regex", &self.is_regex())
            .finish()
    }
}

impl fmt::Display for PatternValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for PatternValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}
