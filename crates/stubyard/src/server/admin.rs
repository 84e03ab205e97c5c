//! Admin portal: read-only views of the active snapshot plus a manual refresh.
//!
//! - `GET /status`: generation, stub count, load time and cache counters
//! - `GET /stubs`: summary of every stub
//! - `GET /stubs/<id>`: one stub in full
//! - `POST /refresh`: reload the data file

use super::response::{error_reply, json_reply};
use crate::cache::CacheStats;
use crate::repository::StubRepository;
use crate::watcher::reload_data_file;
use crate::yaml::StubLoader;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    version: &'static str,
    generation: u64,
    stubs: usize,
    loaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_file: Option<String>,
    cache: CacheStats,
}

#[derive(Debug, Serialize)]
struct StubSummary<'a> {
    id: usize,
    methods: Vec<&'a str>,
    url: &'a str,
    responses: usize,
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    generation: u64,
    stubs: usize,
}

/// Parsed admin route
#[derive(Debug, PartialEq, Eq)]
enum AdminRoute {
    Status,
    Stubs,
    StubById(usize),
    Refresh,
}

impl AdminRoute {
    fn parse(method: &Method, path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match (method, segments.as_slice()) {
            (&Method::GET, ["status"]) => Some(AdminRoute::Status),
            (&Method::GET, ["stubs"]) => Some(AdminRoute::Stubs),
            (&Method::GET, ["stubs", id]) => id.parse().ok().map(AdminRoute::StubById),
            (&Method::POST, ["refresh"]) => Some(AdminRoute::Refresh),
            _ => None,
        }
    }
}

/// HTTP server exposing repository state.
#[derive(Debug, Clone)]
pub struct AdminServer {
    repository: Arc<StubRepository>,
    /// Data file and loader used by `/refresh`
    source: Option<(PathBuf, StubLoader)>,
}

impl AdminServer {
    pub fn new(repository: Arc<StubRepository>) -> Self {
        Self {
            repository,
            source: None,
        }
    }

    /// Enable `/refresh` for `data_file`.
    pub fn with_data_file(mut self, data_file: impl Into<PathBuf>, loader: StubLoader) -> Self {
        self.source = Some((data_file.into(), loader));
        self
    }

    /// Serve connections from `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        info!("Admin portal listening on http://{}", addr);
        let server = Arc::new(self);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let io = TokioIo::new(stream);
                            let server = Arc::clone(&server);
                            tokio::spawn(async move {
                                let service = service_fn(move |req| {
                                    let server = Arc::clone(&server);
                                    async move { server.route(req).await }
                                });
                                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                                    debug!("Admin portal connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => error!("Admin portal accept error: {}", e),
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Admin portal on {} shutting down", addr);
                    break;
                }
            }
        }
        Ok(())
    }

    async fn route(&self, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, hyper::Error> {
        debug!("Admin portal: {} {}", req.method(), req.uri().path());
        let response = match AdminRoute::parse(req.method(), req.uri().path()) {
            Some(AdminRoute::Status) => self.handle_status(),
            Some(AdminRoute::Stubs) => self.handle_list(),
            Some(AdminRoute::StubById(id)) => self.handle_get(id),
            Some(AdminRoute::Refresh) => self.handle_refresh(),
            None => error_reply(
                StatusCode::NOT_FOUND,
                &format!("No admin endpoint for {} {}", req.method(), req.uri().path()),
            ),
        };
        Ok(response)
    }

    fn handle_status(&self) -> Response<Full<Bytes>> {
        let snapshot = self.repository.current_snapshot();
        let status = StatusResponse {
            version: env!("CARGO_PKG_VERSION"),
            generation: snapshot.generation(),
            stubs: snapshot.len(),
            loaded_at: snapshot.loaded_at(),
            data_file: self
                .source
                .as_ref()
                .map(|(path, _)| path.display().to_string()),
            cache: self.repository.cache_stats(),
        };
        json_reply(StatusCode::OK, &status)
    }

    fn handle_list(&self) -> Response<Full<Bytes>> {
        let snapshot = self.repository.current_snapshot();
        let stubs: Vec<StubSummary<'_>> = snapshot
            .records()
            .iter()
            .map(|record| StubSummary {
                id: record.id(),
                methods: record.request().methods().iter().map(String::as_str).collect(),
                url: record.request().url(),
                responses: record.responses().len(),
            })
            .collect();
        json_reply(StatusCode::OK, &stubs)
    }

    fn handle_get(&self, id: usize) -> Response<Full<Bytes>> {
        let snapshot = self.repository.current_snapshot();
        match snapshot.get(id) {
            Some(record) => json_reply(StatusCode::OK, record),
            None => error_reply(StatusCode::NOT_FOUND, &format!("No stub with id {id}")),
        }
    }

    fn handle_refresh(&self) -> Response<Full<Bytes>> {
        let Some((data_file, loader)) = &self.source else {
            return error_reply(StatusCode::BAD_REQUEST, "No data file configured");
        };
        match reload_data_file(loader, &self.repository, data_file) {
            Ok(reloaded) => json_reply(
                StatusCode::OK,
                &RefreshResponse {
                    generation: reloaded.generation,
                    stubs: self.repository.current_snapshot().len(),
                },
            ),
            Err(e) => {
                error!("Refresh of {} failed: {}", data_file.display(), e);
                error_reply(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
        }
    }
}
