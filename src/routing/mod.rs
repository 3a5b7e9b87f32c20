//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (before start):
//!     connect(pattern, method, handler)
//!     → pattern.rs (split on "/:" → literal prefix + parameter count)
//!     → router.rs (method → prefix → parameter count → handler)
//!
//! Dispatch (per request):
//!     (method, path)
//!     → strip query string
//!     → pattern.rs (candidate splits, most specific first)
//!     → router.rs (first registered candidate wins)
//!     → else per-method default handler
//!     → else no match
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable while serving
//! - Deterministic: same input always matches same route
//! - Fewer parameters beat more parameters

pub mod pattern;
pub mod router;

pub use pattern::{candidate_splits, Candidate, RoutePattern, PARAM_DELIMITER};
pub use router::{DefaultHandler, HandlerError, HandlerResult, RouteHandler, RouteInfo, Router};
