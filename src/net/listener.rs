//! TCP listener and connection workers.
//!
//! # Responsibilities
//! - Bind the configured address (optionally behind TLS)
//! - Accept connections and hand each one to its own worker task
//! - Stop cleanly: leave the accept loop, close the socket, then force-close
//!   and join every live worker
//!
//! # Design Decisions
//! - A blocked `accept` is released by a throwaway loopback connection made
//!   after the stopping flag is set; the loop checks the flag after each accept
//! - The TLS handshake runs inside the worker, never in the accept loop
//! - A worker that outlives the join timeout is abandoned with a warning

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::Instrument;

use crate::config::ListenerConfig;
use crate::http::pipeline::RequestPipeline;
use crate::net::client_id::ClientIdAllocator;
use crate::net::connection::{CloseSignal, ConnectionGuard, ConnectionRegistry, JoinOutcome};
use crate::net::tls::{load_tls_acceptor, TlsError};

const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid bind address '{address}': {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// Accepts connections on one address and runs a worker per connection.
pub struct ConnectionListener {
    local_addr: SocketAddr,
    socket: Mutex<Option<Arc<TcpListener>>>,
    tls: Option<TlsAcceptor>,
    pipeline: Arc<RequestPipeline>,
    ids: Arc<ClientIdAllocator>,
    registry: Arc<ConnectionRegistry>,
    stopping: AtomicBool,
    worker_join_timeout: Duration,
}

impl ConnectionListener {
    /// Bind to the configured address.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn bind(
        config: &ListenerConfig,
        pipeline: Arc<RequestPipeline>,
        worker_join_timeout: Duration,
    ) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|source| ListenerError::InvalidAddress {
                address: config.bind_address.clone(),
                source,
            })?;

        let tls = match &config.tls {
            Some(tls) => Some(load_tls_acceptor(&tls.cert_path, &tls.key_path)?),
            None => None,
        };

        let bind_err = |source| ListenerError::Bind { address: addr, source };
        let socket = if addr.is_ipv4() { TcpSocket::new_v4() } else { TcpSocket::new_v6() };
        let socket = socket.map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;
        let listener = socket.listen(config.backlog).map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        tracing::info!(
            address = %local_addr,
            backlog = config.backlog,
            tls = tls.is_some(),
            "Listener bound"
        );

        Ok(Self {
            local_addr,
            socket: Mutex::new(Some(Arc::new(listener))),
            tls,
            pipeline,
            ids: Arc::new(ClientIdAllocator::new()),
            registry: Arc::new(ConnectionRegistry::new()),
            stopping: AtomicBool::new(false),
            worker_join_timeout,
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connections with a live worker.
    pub fn active_connections(&self) -> usize {
        self.registry.len()
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Run the accept loop until the listener is stopped.
    pub async fn run(&self) {
        let listener = self.lock_socket().clone();
        let Some(listener) = listener else {
            tracing::debug!(address = %self.local_addr, "Listener closed before accepting");
            return;
        };

        async {
            tracing::info!("Accepting connections");
            loop {
                let accepted = listener.accept().await;
                if self.is_stopping() {
                    tracing::debug!("Stop requested, leaving accept loop");
                    break;
                }
                match accepted {
                    Ok((stream, peer)) => self.spawn_worker(stream, peer),
                    Err(e) => tracing::error!(error = %e, "Failed to accept connection"),
                }
            }
        }
        .instrument(tracing::info_span!("listener", address = %self.local_addr))
        .await;
    }

    fn spawn_worker(&self, stream: TcpStream, peer: SocketAddr) {
        let id = self.ids.allocate();
        tracing::debug!(connection_id = %id, peer = %peer, "Connection accepted");

        let guard = ConnectionGuard::new(id, Arc::clone(&self.registry), Arc::clone(&self.ids));
        let close = CloseSignal::new();
        let worker = run_worker(
            stream,
            peer,
            guard,
            close.clone(),
            self.tls.clone(),
            Arc::clone(&self.pipeline),
        )
        .instrument(tracing::info_span!("connection", id = %id, peer = %peer));

        if !self.registry.spawn(id, peer, close, worker) {
            tracing::debug!(connection_id = %id, "Listener stopping, connection dropped");
        }
    }

    /// Stop accepting, then close and join every live connection.
    ///
    /// Calling this more than once is a no-op after the first call.
    pub async fn stop(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            tracing::debug!(address = %self.local_addr, "Listener already stopping");
            return;
        }
        tracing::info!(address = %self.local_addr, "Stopping listener");

        self.wake_accept_loop().await;
        if self.lock_socket().take().is_none() {
            tracing::warn!(address = %self.local_addr, "Listening socket already closed");
        }

        let handles = self.registry.close_and_drain();
        tracing::debug!(count = handles.len(), "Closing client connections");

        for handle in handles {
            let (id, peer) = (handle.id(), handle.peer());
            handle.force_close();
            match handle.join(self.worker_join_timeout).await {
                JoinOutcome::Finished => tracing::debug!(connection_id = %id, "Connection worker finished"),
                JoinOutcome::Failed => {}
                JoinOutcome::Abandoned => tracing::warn!(
                    connection_id = %id,
                    peer = %peer,
                    timeout_secs = self.worker_join_timeout.as_secs_f64(),
                    "Connection worker did not finish in time, continuing anyway"
                ),
            }
            self.ids.release(id);
        }

        tracing::info!(address = %self.local_addr, "Listener stopped");
    }

    async fn wake_accept_loop(&self) {
        let target = wake_address(self.local_addr);
        match tokio::time::timeout(WAKE_TIMEOUT, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => drop(stream),
            Ok(Err(e)) => tracing::warn!(target = %target, error = %e, "Could not wake accept loop"),
            Err(_) => tracing::warn!(target = %target, "Timed out waking accept loop"),
        }
    }

    fn lock_socket(&self) -> std::sync::MutexGuard<'_, Option<Arc<TcpListener>>> {
        self.socket.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Loopback equivalent of an unspecified bind address.
fn wake_address(addr: SocketAddr) -> SocketAddr {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, addr.port())
}

async fn run_worker(
    stream: TcpStream,
    peer: SocketAddr,
    guard: ConnectionGuard,
    close: CloseSignal,
    tls: Option<TlsAcceptor>,
    pipeline: Arc<RequestPipeline>,
) {
    tokio::select! {
        _ = close.fired() => tracing::debug!("Connection force-closed"),
        _ = serve_stream(stream, peer, tls, &pipeline) => {}
    }
    drop(guard);
}

async fn serve_stream(mut stream: TcpStream, peer: SocketAddr, tls: Option<TlsAcceptor>, pipeline: &RequestPipeline) {
    let Some(acceptor) = tls else {
        pipeline.serve(&mut stream, peer).await;
        close_stream(&mut stream).await;
        return;
    };

    let handshake = acceptor.accept(stream);
    let accepted = match pipeline.settings().read_timeout {
        Some(limit) => tokio::time::timeout(limit, handshake)
            .await
            .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out"))),
        None => handshake.await,
    };

    match accepted {
        Ok(mut tls_stream) => {
            pipeline.serve(&mut tls_stream, peer).await;
            close_stream(&mut tls_stream).await;
        }
        Err(e) => tracing::warn!(error = %e, "TLS handshake failed"),
    }
}

async fn close_stream<S>(stream: &mut S)
where
    S: AsyncWrite + Unpin,
{
    if let Err(e) = stream.shutdown().await {
        tracing::debug!(error = %e, "Connection was already closed");
    }
}
