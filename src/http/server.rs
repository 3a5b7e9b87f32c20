//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Collect routes, default handlers and the 404 page before start
//! - Install the built-in static file and docs handlers
//! - Bind every configured listener and run its accept loop
//! - Stop all listeners and join their accept loops

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::handlers::docs;
use crate::handlers::static_files::{PatternError, ServerSignature, StaticFiles};
use crate::http::framer::FramerLimits;
use crate::http::pipeline::{NotFoundPage, PipelineSettings, RequestPipeline};
use crate::http::request::Headers;
use crate::net::listener::{ConnectionListener, ListenerError};
use crate::routing::{HandlerResult, Router};

/// Error type for building or starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    StaticFiles(#[from] PatternError),
}

/// A server that has not started yet.
pub struct HttpServer {
    config: ServerConfig,
    router: Router,
    not_found_page: Option<NotFoundPage>,
    signature: ServerSignature,
}

impl HttpServer {
    /// Create a server with the given configuration.
    ///
    /// When static files are enabled the `GET` default handler serves them.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let signature = ServerSignature::new();
        let mut router = Router::new();

        if config.static_files.enabled {
            let files = Arc::new(StaticFiles::from_config(&config.static_files, signature.clone())?);
            router.set_default_handler("GET", move |path, _, _| files.handle(path));
            tracing::debug!(root = %config.static_files.root.display(), "Static file handler installed");
        }

        Ok(Self {
            config,
            router,
            not_found_page: None,
            signature,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Register `handler` for `pattern` under `method`.
    pub fn connect<F>(&mut self, pattern: &str, method: &str, handler: F) -> &mut Self
    where
        F: Fn(&[u8], &[String]) -> HandlerResult + Send + Sync + 'static,
    {
        self.router.connect(pattern, method, handler);
        self
    }

    /// Register a handler with a description shown on the docs pages.
    pub fn connect_documented<F>(&mut self, pattern: &str, method: &str, description: &str, handler: F) -> &mut Self
    where
        F: Fn(&[u8], &[String]) -> HandlerResult + Send + Sync + 'static,
    {
        self.router.connect_documented(pattern, method, description, handler);
        self
    }

    /// Replace the default handler for `method`, including the static file handler for `GET`.
    pub fn set_default_handler<F>(&mut self, method: &str, handler: F) -> &mut Self
    where
        F: Fn(&str, &Headers, &[u8]) -> HandlerResult + Send + Sync + 'static,
    {
        self.router.set_default_handler(method, handler);
        self
    }

    /// Render 404 bodies with `page` instead of the fixed page.
    pub fn set_not_found_page<F>(&mut self, page: F) -> &mut Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.not_found_page = Some(Arc::new(page));
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Bind every listener and start accepting.
    ///
    /// On failure, listeners bound so far are closed again.
    pub async fn start(self) -> Result<RunningServer, ServerError> {
        let Self {
            config,
            mut router,
            not_found_page,
            signature,
        } = self;

        if config.docs.enabled {
            docs::install(&mut router);
        }

        let settings = PipelineSettings {
            read_timeout: config.timeouts.read_timeout(),
            limits: FramerLimits {
                max_head_bytes: config.limits.max_head_bytes,
                max_body_bytes: config.limits.max_body_bytes,
            },
            expose_handler_errors: config.diagnostics.expose_handler_errors,
        };
        let pipeline = Arc::new(RequestPipeline::new(Arc::new(router), settings).with_not_found_page(not_found_page));

        let mut listeners = Vec::with_capacity(config.listeners.len());
        for listener_config in &config.listeners {
            match ConnectionListener::bind(listener_config, Arc::clone(&pipeline), config.timeouts.worker_join_timeout()).await {
                Ok(listener) => listeners.push(Arc::new(listener)),
                Err(e) => {
                    for bound in &listeners {
                        bound.stop().await;
                    }
                    return Err(e.into());
                }
            }
        }

        signature.set_addresses(listeners.iter().map(|l| l.local_addr()));

        let tasks = listeners
            .iter()
            .map(|listener| {
                let listener = Arc::clone(listener);
                tokio::spawn(async move { listener.run().await })
            })
            .collect();

        tracing::info!(
            addresses = ?listeners.iter().map(|l| l.local_addr()).collect::<Vec<_>>(),
            "Server started"
        );

        Ok(RunningServer {
            listeners,
            tasks,
            listener_join_timeout: config.timeouts.listener_join_timeout(),
        })
    }
}

/// A started server.
pub struct RunningServer {
    listeners: Vec<Arc<ConnectionListener>>,
    tasks: Vec<JoinHandle<()>>,
    listener_join_timeout: Duration,
}

impl RunningServer {
    /// Bound addresses, in configuration order.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners.iter().map(|l| l.local_addr()).collect()
    }

    /// Live connections across all listeners.
    pub fn active_connections(&self) -> usize {
        self.listeners.iter().map(|l| l.active_connections()).sum()
    }

    /// Stop every listener, then wait for each accept loop to end.
    pub async fn stop(mut self) {
        tracing::info!("Stopping server");
        let listeners = std::mem::take(&mut self.listeners);
        let tasks = std::mem::take(&mut self.tasks);
        for listener in &listeners {
            listener.stop().await;
        }

        for (listener, task) in listeners.iter().zip(tasks) {
            match tokio::time::timeout(self.listener_join_timeout, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(address = %listener.local_addr(), error = %e, "Accept loop failed"),
                Err(_) => tracing::warn!(
                    address = %listener.local_addr(),
                    timeout_secs = self.listener_join_timeout.as_secs_f64(),
                    "Accept loop did not finish in time, continuing anyway"
                ),
            }
        }
        tracing::info!("Server stopped");
    }
}

impl Drop for RunningServer {
    /// Dropping without [`stop`](Self::stop) aborts the accept loops; live
    /// connections finish on their own.
    fn drop(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        tracing::warn!(
            addresses = ?self.local_addrs(),
            "Server dropped without stop, aborting accept loops"
        );
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
