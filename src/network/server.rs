//! TCP Server
//!
//! Accepts connections and hands each one to its own thread.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::ServerConfig;
use crate::error::{Result, TinySqlError};
use crate::handler::QueryHandler;
use super::handshake::server_handshake;
use super::registry::{ConnectionHandle, Registry};
use super::{CancelToken, ConnContext, Connection, ConnectionId, IdAllocator};

/// How long the accept loop sleeps when no client is waiting
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// State shared between the accept loop and connection threads
struct Shared {
    config: ServerConfig,
    ids: IdAllocator,
    registry: Arc<Registry>,
    handler: Arc<dyn QueryHandler>,
    active: AtomicUsize,

    /// Sockets of connections still in the handshake, closed on shutdown
    pending: Mutex<HashMap<ConnectionId, TcpStream>>,
}

/// TCP server for TinySQL
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    shutdown: CancelToken,
}

impl Server {
    /// Bind the listen address from `config`
    pub fn bind(config: ServerConfig, handler: Arc<dyn QueryHandler>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        // Non-blocking so the loop can notice shutdown between accepts
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        tracing::info!("listening on {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            shared: Arc::new(Shared {
                config,
                ids: IdAllocator::new(),
                registry: Arc::new(Registry::new()),
                handler,
                active: AtomicUsize::new(0),
                pending: Mutex::new(HashMap::new()),
            }),
            shutdown: CancelToken::new(),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.shared.registry)
    }

    /// Number of connection threads currently running, authenticated or not
    pub fn active_connections(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Handle that stops [`run`](Self::run) from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.shutdown.clone(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Start the server (blocking until shutdown)
    pub fn run(&self) -> Result<()> {
        while !self.shutdown.is_cancelled() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = self.dispatch(stream) {
                        tracing::warn!("failed to set up connection from {}: {}", peer, e);
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    // Usually transient (e.g. EMFILE); keep accepting
                    tracing::warn!("failed to accept client conn: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!("server on {} stopped accepting", self.local_addr);
        Ok(())
    }

    /// Wrap an accepted socket and spawn its connection thread
    fn dispatch(&self, stream: TcpStream) -> Result<()> {
        let shared = &self.shared;
        let max = shared.config.max_connections;
        if max > 0 && shared.active.load(Ordering::Acquire) >= max {
            tracing::warn!(
                "rejecting {}: {} connections already active",
                stream.peer_addr().map(|a| a.to_string()).unwrap_or_default(),
                max
            );
            return Ok(());
        }

        stream.set_nonblocking(false)?;
        if shared.config.nodelay {
            stream.set_nodelay(true)?;
        }

        let id = shared.ids.allocate().ok_or_else(|| {
            TinySqlError::Transport(std::io::Error::new(
                ErrorKind::Other,
                "connection id space exhausted",
            ))
        })?;
        let conn = Connection::new(id, stream, shared.config.max_frame_size)?;
        // Derived from the server token so shutdown reaches every connection
        let ctx = ConnContext::with_parent(id, &self.shutdown);

        tracing::debug!(conn = %id, "accepted connection from {}", conn.peer_addr());

        let slot = ConnectionSlot::acquire(shared, id, conn.try_clone_socket().ok());
        thread::Builder::new()
            .name(format!("conn-{}", id))
            .spawn(move || on_conn(slot, conn, ctx))?;
        Ok(())
    }
}

/// One admitted connection thread
///
/// Counts towards `max_connections` and keeps the socket in the pending
/// table until the handshake is done. Both are released on drop, so a
/// panicking handler does not leak the slot.
struct ConnectionSlot {
    shared: Arc<Shared>,
    id: ConnectionId,
}

impl ConnectionSlot {
    fn acquire(shared: &Arc<Shared>, id: ConnectionId, socket: Option<TcpStream>) -> Self {
        shared.active.fetch_add(1, Ordering::AcqRel);
        if let Some(socket) = socket {
            shared.pending.lock().insert(id, socket);
        }
        Self {
            shared: Arc::clone(shared),
            id,
        }
    }

    fn handshake_done(&self) {
        self.shared.pending.lock().remove(&self.id);
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.shared.pending.lock().remove(&self.id);
        self.shared.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Body of a connection thread: handshake, register, serve, close
fn on_conn(slot: ConnectionSlot, mut conn: Connection, ctx: ConnContext) {
    let shared = Arc::clone(&slot.shared);
    let id = ctx.id();

    if let Err(e) = server_handshake(&mut conn, &ctx, &shared.config.default_database) {
        tracing::warn!(conn = %id, "failed to handshake with client {}: {}", conn.peer_addr(), e);
        let _ = conn.close();
        return;
    }
    slot.handshake_done();

    let handle = ConnectionHandle {
        id,
        user: conn.user().unwrap_or_default().to_string(),
        database: conn.database().unwrap_or_default().to_string(),
        peer_addr: conn.peer_addr().to_string(),
        connected_at: Instant::now(),
        cancel: ctx.cancel_token().clone(),
        socket: conn.try_clone_socket().ok(),
    };
    let _registration = shared.registry.register(handle);

    // A shutdown that swept the registry before this insert has already
    // fired the parent token, so the first read in `serve` sees it.
    match conn.serve(&ctx, shared.handler.as_ref()) {
        Ok(()) => tracing::debug!(conn = %id, "connection closed by client"),
        Err(e) if e.is_disconnect() => {
            tracing::debug!(conn = %id, "client {} disconnected: {}", conn.peer_addr(), e)
        }
        Err(TinySqlError::Cancelled) => tracing::debug!(conn = %id, "connection cancelled"),
        Err(e) => tracing::warn!(conn = %id, "closing connection {}: {}", conn.peer_addr(), e),
    }

    if let Err(e) = conn.close() {
        tracing::debug!(conn = %id, "error closing socket: {}", e);
    }
}

/// Stops a running server
#[derive(Clone)]
pub struct ShutdownHandle {
    token: CancelToken,
    shared: Arc<Shared>,
}

impl ShutdownHandle {
    /// Stop accepting and cancel every connection, handshaken or not
    pub fn shutdown(&self) {
        self.token.cancel();

        let pending = {
            let pending = self.shared.pending.lock();
            for socket in pending.values() {
                let _ = socket.shutdown(Shutdown::Both);
            }
            pending.len()
        };
        let cancelled = self.shared.registry.cancel_all();
        tracing::info!(
            "shutdown requested, cancelled {} connections and {} pending handshakes",
            cancelled,
            pending
        );
    }
}
