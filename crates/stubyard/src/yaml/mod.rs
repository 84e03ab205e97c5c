//! Configuration loading.
//!
//! The configuration document is a YAML sequence of blocks, each pairing a
//! `request` mapping with a `response` mapping or a sequence of them:
//!
//! ```yaml
//! - request:
//!     method: GET
//!     url: /ping
//!   response:
//!     status: 200
//!     body: pong
//! ```

mod error;
mod fields;
mod loader;

pub use error::LoadError;
pub use loader::{LoadedFile, StubLoader};
