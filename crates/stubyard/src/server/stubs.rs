//! Stub portal: answers client requests from the active snapshot.

use super::response::{error_reply, read_body};
use crate::repository::StubRepository;
use crate::request::IncomingRequest;
use crate::resolver::{Resolution, ResponseOutput, ResponseResolver};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Returned to hyper when a request is abandoned mid-latency, so the
/// connection is closed without writing a response.
#[derive(Debug, thiserror::Error)]
#[error("Request abandoned before its response was ready")]
pub struct Abandoned;

/// HTTP server for stubbed endpoints.
#[derive(Debug, Clone)]
pub struct StubServer {
    repository: Arc<StubRepository>,
    resolver: ResponseResolver,
    debug_requests: bool,
}

impl StubServer {
    pub fn new(repository: Arc<StubRepository>) -> Self {
        Self {
            repository,
            resolver: ResponseResolver::new(),
            debug_requests: false,
        }
    }

    /// Log every incoming request in full.
    pub fn with_debug_requests(mut self, enabled: bool) -> Self {
        self.debug_requests = enabled;
        self
    }

    /// Serve connections from `listener` until `shutdown` fires.
    ///
    /// Requests still waiting out a latency when `shutdown` fires are
    /// abandoned.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        info!("Stub portal listening on http://{}", addr);
        let server = Arc::new(self);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let server = Arc::clone(&server);
                            let shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req| {
                                    let server = Arc::clone(&server);
                                    let cancel = shutdown.child_token();
                                    async move { server.handle(req, cancel).await }
                                });
                                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                                    debug!("Stub portal connection from {} closed: {}", peer, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Stub portal accept error: {}", e);
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Stub portal on {} shutting down", addr);
                    break;
                }
            }
        }
        Ok(())
    }

    async fn handle(
        &self,
        req: Request<Incoming>,
        cancel: CancellationToken,
    ) -> Result<Response<Full<Bytes>>, Abandoned> {
        // Dropping the request future (client gone) cancels any pending latency
        let _guard = cancel.clone().drop_guard();

        let (parts, body) = req.into_parts();
        let body = match read_body(body).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read request body: {}", e);
                return Ok(error_reply(
                    StatusCode::BAD_REQUEST,
                    &format!("Failed to read request body: {e}"),
                ));
            }
        };
        let request = IncomingRequest::from_parts(&parts.method, &parts.uri, &parts.headers, body);

        if self.debug_requests {
            info!(
                "Incoming request: {} headers={:?} body={}",
                request,
                request.headers(),
                request.body_text()
            );
        }

        let Some(matched) = self.repository.find(&request) else {
            warn!("No stub matched {}", request);
            return Ok(ResponseOutput::not_found(&request).into());
        };

        match self.resolver.resolve(&matched, &request, &cancel).await {
            Resolution::Ready(output) => Ok(output.into()),
            Resolution::Cancelled => Err(Abandoned),
        }
    }
}
