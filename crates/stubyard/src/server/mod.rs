//! HTTP portals.
//!
//! Both portals are hyper 1 HTTP/1.1 servers running one tokio task per
//! connection, and both stop accepting when the shared shutdown token fires.

mod admin;
mod response;
mod stubs;

pub use admin::AdminServer;
pub use stubs::{Abandoned, StubServer};
