//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields
//!     → inside spans: listener{address} → connection{id, peer}
//!
//! Consumers:
//!     → logging.rs (fmt subscriber on stdout, filtered by RUST_LOG / config)
//! ```
//!
//! # Design Decisions
//! - The library never installs a subscriber; only the binary does
//! - One access-log line per served request at `info`
//! - Routine client behaviour (timeouts, early closes) stays at `debug`

pub mod logging;

pub use logging::init_logging;
