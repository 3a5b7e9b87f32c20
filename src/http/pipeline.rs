//! Per-connection request pipeline.
//!
//! # Responsibilities
//! - Frame one request off the connection
//! - Dispatch it through the router on the blocking pool
//! - Answer with the handler's response, a 404 page or a 500 page
//!
//! # Design Decisions
//! - Framing failures close the connection without a response
//! - Handler errors and panics are both answered with a 500
//! - The diagnostic text is always logged, but only sent to the client when enabled
//! - The pipeline never closes the stream; the connection owner does

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::Span;

use crate::http::framer::{self, FramerLimits};
use crate::http::request::Request;
use crate::http::response::{internal_error_page, not_found_page, Response, ResponseWriter};
use crate::routing::Router;

/// Renders the body of a 404 page for a path.
pub type NotFoundPage = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Tunables for the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Per-read socket timeout; `None` waits forever.
    pub read_timeout: Option<Duration>,
    pub limits: FramerLimits,
    /// Embed handler diagnostics in 500 pages.
    pub expose_handler_errors: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            read_timeout: Some(Duration::from_secs(30)),
            limits: FramerLimits::default(),
            expose_handler_errors: false,
        }
    }
}

enum Outcome {
    Served(Response),
    NotFound,
    Failed(String),
}

/// Runs framer → router → writer for one connection.
pub struct RequestPipeline {
    router: Arc<Router>,
    settings: PipelineSettings,
    not_found_page: Option<NotFoundPage>,
}

impl RequestPipeline {
    pub fn new(router: Arc<Router>, settings: PipelineSettings) -> Self {
        Self {
            router,
            settings,
            not_found_page: None,
        }
    }

    /// Replace the fixed 404 body.
    pub fn with_not_found_page(mut self, page: Option<NotFoundPage>) -> Self {
        self.not_found_page = page;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Serve exactly one request on `stream`.
    pub async fn serve<S>(&self, stream: &mut S, peer: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin + ?Sized,
    {
        let request = match framer::receive(stream, self.settings.read_timeout, self.settings.limits).await {
            Ok(request) => Arc::new(request),
            Err(e) if e.is_benign() => {
                tracing::debug!(peer = %peer, error = %e, "No request received");
                return;
            }
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "Failed to read request");
                return;
            }
        };

        let path = request.path_without_query().to_string();
        let mut writer = ResponseWriter::new(stream);

        let (status, sent) = match self.dispatch(Arc::clone(&request)).await {
            Outcome::Served(response) => (response.status, writer.send(&response, &path).await),
            Outcome::NotFound => {
                let body = match &self.not_found_page {
                    Some(page) => page(&request.path),
                    None => not_found_page(&request.path),
                };
                let status = StatusCode::NOT_FOUND;
                (status, send_page(&mut writer, status, "404.html", &body).await)
            }
            Outcome::Failed(diagnostic) => {
                tracing::error!(
                    peer = %peer,
                    method = %request.method,
                    path = %request.path,
                    diagnostic = %diagnostic,
                    "Handler failed"
                );
                let shown = self.settings.expose_handler_errors.then_some(diagnostic.as_str());
                let body = internal_error_page(&request.path, shown);
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (status, send_page(&mut writer, status, "500.html", &body).await)
            }
        };

        match sent {
            Ok(()) => tracing::info!(
                peer = %peer,
                method = %request.method,
                path = %request.path,
                status = status.as_u16(),
                "Request served"
            ),
            Err(e) => tracing::warn!(
                peer = %peer,
                status = status.as_u16(),
                error = %e,
                "Failed to send response"
            ),
        }
    }

    async fn dispatch(&self, request: Arc<Request>) -> Outcome {
        let router = Arc::clone(&self.router);
        let span = Span::current();
        let task = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            router.dispatch(&request.method, &request.path, &request.headers, &request.body)
        });

        match task.await {
            Ok(Ok(Some(response))) => Outcome::Served(response),
            Ok(Ok(None)) => Outcome::NotFound,
            Ok(Err(e)) => Outcome::Failed(describe_error(e.as_ref())),
            Err(e) if e.is_panic() => Outcome::Failed(describe_panic(e.into_panic())),
            Err(e) => Outcome::Failed(format!("handler task did not complete: {e}")),
        }
    }
}

async fn send_page<W>(writer: &mut ResponseWriter<'_, W>, status: StatusCode, hint: &str, body: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.send_status(status, hint).await?;
    writer.send_body(body.as_bytes()).await
}

/// Render an error and its source chain, one cause per line.
fn describe_error(error: &(dyn std::error::Error + Send + Sync + 'static)) -> String {
    let mut text = format!("handler error: {error}");
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(&format!("\ncaused by: {cause}"));
        source = cause.source();
    }
    text
}

fn describe_panic(payload: Box<dyn Any + Send>) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("handler panicked: {message}")
}
