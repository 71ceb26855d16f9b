//! Per-connection context
//!
//! Connection identifiers, their allocator, and the cancellation token
//! threaded through every blocking call of a connection.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Process-unique connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out connection identifiers
///
/// Owned by a server instance rather than the process, so two servers
/// (or two tests) never share a counter. Ids start at 1 and are never
/// reused; once `u32::MAX` has been handed out the allocator is exhausted.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: AtomicU32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator whose next id is `last + 1`
    pub fn starting_after(last: u32) -> Self {
        Self {
            last: AtomicU32::new(last),
        }
    }

    /// Allocate the next identifier, or `None` when the id space is used up
    pub fn allocate(&self) -> Option<ConnectionId> {
        self.last
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| last.checked_add(1))
            .ok()
            .map(|last| ConnectionId(last + 1))
    }
}

/// Cooperative cancellation flag
///
/// Clones share the same flag. A [`child`](Self::child) token has its own
/// flag but also reports cancelled once its parent is.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    parent: Option<Box<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// New token cancelled by either itself or `self`
    pub fn child(&self) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }
}

/// Context carried through handshake and dispatch of one connection
#[derive(Debug, Clone)]
pub struct ConnContext {
    id: ConnectionId,
    cancel: CancelToken,
}

impl ConnContext {
    /// Context with a standalone cancellation token
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            cancel: CancelToken::new(),
        }
    }

    /// Context whose token is also cancelled when `parent` is
    pub fn with_parent(id: ConnectionId, parent: &CancelToken) -> Self {
        Self {
            id,
            cancel: parent.child(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
