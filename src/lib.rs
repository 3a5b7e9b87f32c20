//! wirehost: a minimal multi-listener HTTP/1.0 server library.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ net::listener ──▶ worker task ──▶ http::framer ──▶ routing::router
//!                 (accept loop)    (per connection,              │
//!                                   optional TLS)                ▼
//!     Client ◀── http::response ◀──────────────── handler / default handler
//!                                                 (static files, docs)
//!
//!     Cross-cutting: config, observability (tracing), lifecycle (signals)
//! ```
//!
//! Each connection carries exactly one request. Handlers are synchronous
//! closures run on the blocking pool; a failing or panicking handler yields a
//! 500 page and never takes the server down.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Built-in content
pub mod handlers;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfig;
pub use http::{HttpServer, Response, RunningServer, ServerError};
pub use routing::{HandlerError, HandlerResult, Router};
