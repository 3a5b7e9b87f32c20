//! Built-in handlers.
//!
//! # Data Flow
//! ```text
//! HttpServer::new
//!     → static_files.rs installed as the GET default handler
//! HttpServer::start
//!     → docs.rs registers /docs/ and /docs/json/ from the final route list
//! ```

pub mod docs;
pub mod static_files;

pub use static_files::{ServerSignature, StaticFiles};
