//! Recyclable client identifiers.
//!
//! # Responsibilities
//! - Hand out a small integer id for every live connection
//! - Take ids back when connections finish so they can be reused
//!
//! # Design Decisions
//! - Only the set of currently assigned ids is consulted
//! - Allocation prefers the gap directly below the current minimum and
//!   grows upward once the minimum has reached zero
//! - Allocation and release share one lock and never interleave

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Identifier of one live connection.
///
/// Unique among live connections at any instant, not stable across reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(u64);

impl ClientId {
    /// Get the raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ClientId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Allocates and releases [`ClientId`]s.
#[derive(Debug, Default)]
pub struct ClientIdAllocator {
    active: Mutex<BTreeSet<u64>>,
}

impl ClientIdAllocator {
    /// Create an allocator with no active ids.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a new id.
    ///
    /// With no active ids this is `0`. Otherwise, when the smallest active id
    /// is `0` the result is one above the largest active id, else one below
    /// the smallest.
    pub fn allocate(&self) -> ClientId {
        let mut active = self.lock();
        let id = match (active.first(), active.last()) {
            (Some(&lo), Some(&hi)) => {
                if lo == 0 {
                    hi + 1
                } else {
                    lo - 1
                }
            }
            _ => 0,
        };
        active.insert(id);
        ClientId(id)
    }

    /// Return an id to the pool. Releasing an id that is not active is a no-op.
    pub fn release(&self, id: ClientId) {
        self.lock().remove(&id.0);
    }

    /// Whether `id` is currently assigned.
    pub fn is_active(&self, id: ClientId) -> bool {
        self.lock().contains(&id.0)
    }

    /// Number of currently assigned ids.
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<u64>> {
        // A plain set cannot be left half-updated, so a poisoned lock is still usable.
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
