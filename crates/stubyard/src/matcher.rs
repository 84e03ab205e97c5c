//! Request matching.
//!
//! A pattern matches when every field it configures matches; fields the
//! pattern leaves out impose no constraint. Header and query constraints are
//! subset constraints: extra request entries are ignored.

use crate::model::StubRequest;
use crate::request::IncomingRequest;

/// Check whether a request satisfies a stub's request pattern.
pub fn matches(pattern: &StubRequest, request: &IncomingRequest) -> bool {
    method_matches(pattern, request)
        && pattern.path().is_match(request.path())
        && query_matches(pattern, request)
        && headers_match(pattern, request)
        && body_matches(pattern, request)
}

fn method_matches(pattern: &StubRequest, request: &IncomingRequest) -> bool {
    // Both sides are uppercase after normalization
    pattern.methods().contains(request.method())
}

fn query_matches(pattern: &StubRequest, request: &IncomingRequest) -> bool {
    pattern.query().iter().all(|(name, expected)| {
        request
            .query_param(name)
            .is_some_and(|actual| expected.is_match(actual))
    })
}

fn headers_match(pattern: &StubRequest, request: &IncomingRequest) -> bool {
    pattern.headers().iter().all(|(name, expected)| {
        request
            .header(name)
            .is_some_and(|actual| expected.is_match(actual))
    })
}

fn body_matches(pattern: &StubRequest, request: &IncomingRequest) -> bool {
    match pattern.post() {
        Some(expected) => expected.is_match(request.body()),
        None => true,
    }
}
