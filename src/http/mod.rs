//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection (one request per connection)
//!     → framer.rs (request line, headers, Content-Length body)
//!     → request.rs (Request / Headers)
//!     → pipeline.rs (router dispatch on the blocking pool)
//!     → response.rs (status line, Content-Type, body; 404/500 pages)
//!     → connection closed by the worker
//!
//! server.rs wires the router, the pipeline and the listeners together.
//! ```

pub mod error;
pub mod framer;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use error::RequestError;
pub use pipeline::{NotFoundPage, PipelineSettings, RequestPipeline};
pub use request::{Headers, Request};
pub use response::Response;
pub use server::{HttpServer, RunningServer, ServerError};
