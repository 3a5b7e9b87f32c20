//! Live-connection registry and per-connection lifecycle.
//!
//! # Responsibilities
//! - Track every live connection by its [`ClientId`]
//! - Give the listener a way to force-close and join workers on shutdown
//! - Deregister a connection and free its id when its worker ends
//!
//! # Design Decisions
//! - The registry lock is only held for map mutation, never across I/O
//! - A worker is inserted in the same critical section that spawns it, so its
//!   self-removal can never run before the entry exists
//! - Self-removal is RAII ([`ConnectionGuard`]) so it also happens on panic

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::net::client_id::{ClientId, ClientIdAllocator};

/// How a worker ended when the listener waited for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The worker finished within the timeout.
    Finished,
    /// The worker task panicked or was cancelled.
    Failed,
    /// The worker was still running after the timeout and was abandoned.
    Abandoned,
}

/// Signal used to force a worker to drop its socket.
#[derive(Debug, Clone, Default)]
pub struct CloseSignal(Arc<Notify>);

impl CloseSignal {
    /// Create an unfired signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. A worker that is not waiting yet sees it on its next wait.
    pub fn fire(&self) {
        self.0.notify_one();
    }

    /// Wait until the signal is fired.
    pub async fn fired(&self) {
        self.0.notified().await;
    }
}

/// The listener's handle on one live connection.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ClientId,
    peer: SocketAddr,
    close: CloseSignal,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Id of the connection.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Remote address of the connection.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Force the worker to close its socket and unwind.
    pub fn force_close(&self) {
        self.close.fire();
    }

    /// Wait for the worker to finish, abandoning it after `timeout`.
    pub async fn join(mut self, timeout: Duration) -> JoinOutcome {
        match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(Ok(())) => JoinOutcome::Finished,
            Ok(Err(e)) => {
                tracing::warn!(connection_id = %self.id, peer = %self.peer, error = %e, "Connection worker failed");
                JoinOutcome::Failed
            }
            Err(_) => {
                self.task.abort();
                JoinOutcome::Abandoned
            }
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    live: HashMap<ClientId, ConnectionHandle>,
    closed: bool,
}

/// Registry of live connections, shared by the accept loop and all workers.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `worker` and record it under `id` atomically with respect to removal.
    ///
    /// Returns `false` without spawning once the registry has been closed by
    /// [`close_and_drain`](Self::close_and_drain).
    pub fn spawn<F>(&self, id: ClientId, peer: SocketAddr, close: CloseSignal, worker: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.lock();
        if state.closed {
            // The worker owns a guard that locks the registry when dropped.
            drop(state);
            drop(worker);
            return false;
        }
        let task = tokio::spawn(worker);
        state.live.insert(id, ConnectionHandle { id, peer, close, task });
        true
    }

    /// Remove a connection, returning its handle if it was still registered.
    pub fn remove(&self, id: ClientId) -> Option<ConnectionHandle> {
        self.lock().live.remove(&id)
    }

    /// Refuse further registrations and take every live connection out, ordered by id.
    pub fn close_and_drain(&self) -> Vec<ConnectionHandle> {
        let mut state = self.lock();
        state.closed = true;
        let mut handles: Vec<_> = state.live.drain().map(|(_, handle)| handle).collect();
        drop(state);
        handles.sort_by_key(ConnectionHandle::id);
        handles
    }

    /// Whether the registry refuses new connections.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.lock().live.len()
    }

    /// Whether no connection is live.
    pub fn is_empty(&self) -> bool {
        self.lock().live.is_empty()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: ClientId) -> bool {
        self.lock().live.contains_key(&id)
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Guard owned by a worker for its connection's lifetime.
///
/// On drop the connection is removed from the registry, then its id is released.
#[derive(Debug)]
pub struct ConnectionGuard {
    id: ClientId,
    registry: Arc<ConnectionRegistry>,
    ids: Arc<ClientIdAllocator>,
}

impl ConnectionGuard {
    /// Create a guard for an already allocated id.
    pub fn new(id: ClientId, registry: Arc<ConnectionRegistry>, ids: Arc<ClientIdAllocator>) -> Self {
        Self { id, registry, ids }
    }

    /// Get this connection's id.
    pub fn id(&self) -> ClientId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        // Dropping the removed handle detaches the (finishing) task.
        drop(self.registry.remove(self.id));
        self.ids.release(self.id);
        tracing::trace!(connection_id = %self.id, "Connection deregistered");
    }
}
