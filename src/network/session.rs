//! Session
//!
//! Authenticated per-connection state, opened once after the handshake.

use std::time::Instant;

/// Identity and bookkeeping for one authenticated connection
#[derive(Debug, Clone)]
pub struct Session {
    user: String,
    database: String,
    opened_at: Instant,
    queries: u64,
}

impl Session {
    pub fn open(user: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            database: database.into(),
            opened_at: Instant::now(),
            queries: 0,
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Default database for unqualified names
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    /// Number of queries dispatched on this session
    pub fn queries(&self) -> u64 {
        self.queries
    }

    pub(crate) fn record_query(&mut self) {
        self.queries += 1;
    }
}
