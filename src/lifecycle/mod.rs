//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging → HttpServer::start
//!
//! Shutdown:
//!     signals.rs (SIGTERM/SIGINT) → RunningServer::stop
//!         → stop accepting → close connections → join accept loops
//! ```
//!
//! # Design Decisions
//! - Listeners start last (traffic only when ready)
//! - Shutdown has timeouts: stuck workers are abandoned, not awaited forever

pub mod signals;

pub use signals::shutdown_signal;
