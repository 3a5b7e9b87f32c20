//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, one worker task per connection)
//!     → client_id.rs (recycled connection id: below the current minimum, else above the maximum)
//!     → connection.rs (registry entry, RAII deregistration)
//!     → tls.rs (optional handshake, inside the worker)
//!     → Hand off to HTTP pipeline
//!
//! Connection States:
//!     Accepted → [Handshaking] → Serving → Closed
//!                                      ↘ Force-closed (listener stopping)
//! ```
//!
//! # Design Decisions
//! - One request per connection; the worker closes the socket after responding
//! - Each connection tracked for shutdown, and untracked when its worker ends
//! - TLS is optional and handled transparently

pub mod client_id;
pub mod connection;
pub mod listener;
pub mod tls;

pub use client_id::{ClientId, ClientIdAllocator};
pub use listener::{ConnectionListener, ListenerError};
