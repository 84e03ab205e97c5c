//! Stubyard: a configurable HTTP stub server.
//!
//! Request/response pairs are declared in a YAML data file. Incoming requests
//! are matched against them in order and answered with the configured
//! response, optionally rotating through a sequence and delayed by a latency.
//!
//! ```no_run
//! use std::sync::Arc;
//! use stubyard::{CacheConfig, FsReader, StubLoader, StubRepository, IncomingRequest};
//!
//! let loader = StubLoader::new(".", Arc::new(FsReader));
//! let records = loader
//!     .load("- request:\n    url: /ping\n  response:\n    status: 200\n    body: pong\n")
//!     .unwrap();
//! let repository = StubRepository::with_records(CacheConfig::default(), records);
//! assert!(repository.find(&IncomingRequest::new("GET", "/ping")).is_some());
//! ```

pub mod cache;
pub mod config;
pub mod matcher;
pub mod model;
pub mod repository;
pub mod request;
pub mod resolver;
pub mod resource;
pub mod server;
pub mod watcher;
pub mod yaml;

pub use cache::{CacheConfig, CacheStats, Fingerprint, ResultCache};
pub use config::ServerConfig;
pub use model::{BodyPattern, PatternValue, StubLifecycle, StubRequest, StubResponse, StubResponses};
pub use repository::{Snapshot, StubMatch, StubRepository};
pub use request::IncomingRequest;
pub use resolver::{Resolution, ResponseOutput, ResponseResolver};
pub use resource::{FileStamps, FsReader, MemoryReader, ResourceReader};
pub use server::{AdminServer, StubServer};
pub use watcher::{reload_data_file, ReloadWatcher, Reloaded, WatcherHandle};
pub use yaml::{LoadError, LoadedFile, StubLoader};
