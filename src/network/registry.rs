//! Connection Registry
//!
//! The server's table of authenticated, live connections.
//!
//! Entries are inserted only after a successful handshake and removed
//! when the returned [`Registration`] is dropped, so every way a
//! connection can end (exit, error, panic) clears its entry.

use std::collections::HashMap;
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use super::{CancelToken, ConnectionId};

/// What the registry keeps about a live connection
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub user: String,
    pub database: String,
    pub peer_addr: String,
    pub connected_at: Instant,
    pub cancel: CancelToken,

    /// Second handle to the socket, used only to unblock a pending read
    pub socket: Option<TcpStream>,
}

impl ConnectionHandle {
    fn cancel(&self) {
        self.cancel.cancel();
        if let Some(socket) = &self.socket {
            // The owning thread sees the error on its next read
            let _ = socket.shutdown(Shutdown::Both);
        }
    }
}

/// Read-only view of a registry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub user: String,
    pub database: String,
    pub peer_addr: String,
    pub connected_at: Instant,
}

/// Registry of active connections
///
/// Readers take the shared lock; inserts and removals take it exclusively.
#[derive(Debug, Default)]
pub struct Registry {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authenticated connection
    ///
    /// The entry lives exactly as long as the returned guard.
    pub fn register(self: &Arc<Self>, handle: ConnectionHandle) -> Registration {
        let id = handle.id;
        let previous = self.connections.write().insert(id, handle);
        debug_assert!(previous.is_none(), "connection id {} registered twice", id);

        tracing::debug!(conn = %id, "registered connection");
        Registration {
            registry: Arc::clone(self),
            id,
        }
    }

    fn unregister(&self, id: ConnectionId) {
        if self.connections.write().remove(&id).is_some() {
            tracing::debug!(conn = %id, "unregistered connection");
        }
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().contains_key(&id)
    }

    /// Ids of all live connections, sorted
    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.connections.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn get(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.connections.read().get(&id).map(info)
    }

    /// Consistent snapshot of all live connections, sorted by id
    pub fn snapshot(&self) -> Vec<ConnectionInfo> {
        let mut infos: Vec<_> = self.connections.read().values().map(info).collect();
        infos.sort_by_key(|i| i.id);
        infos
    }

    /// Cancel one connection; returns false if it is not registered
    pub fn cancel(&self, id: ConnectionId) -> bool {
        match self.connections.read().get(&id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every registered connection
    pub fn cancel_all(&self) -> usize {
        let connections = self.connections.read();
        for handle in connections.values() {
            handle.cancel();
        }
        connections.len()
    }
}

fn info(handle: &ConnectionHandle) -> ConnectionInfo {
    ConnectionInfo {
        id: handle.id,
        user: handle.user.clone(),
        database: handle.database.clone(),
        peer_addr: handle.peer_addr.clone(),
        connected_at: handle.connected_at,
    }
}

/// Keeps a connection registered; removes it on drop
#[must_use = "dropping the registration unregisters the connection"]
#[derive(Debug)]
pub struct Registration {
    registry: Arc<Registry>,
    id: ConnectionId,
}

impl Registration {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}
