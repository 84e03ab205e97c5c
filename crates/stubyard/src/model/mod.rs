//! In-memory stub model produced by the loader.
//!
//! - `StubRequest`: request pattern (methods, url, query, headers, post body)
//! - `StubResponse`: canned response (status, headers, body, latency)
//! - `StubLifecycle`: one request pattern with a single response or a
//!   rotating sequence of responses

mod lifecycle;
mod pattern;
mod request;
mod response;

pub use lifecycle::{ResponseCursor, StubLifecycle, StubResponses};
pub use pattern::PatternValue;
pub use request::{BodyPattern, StubRequest};
pub use response::StubResponse;
