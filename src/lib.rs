//! # TinySQL
//!
//! A minimal SQL client/server pair with:
//! - A length-prefixed binary wire protocol
//! - A Startup/Complete handshake before any query traffic
//! - One thread and one session per connection
//! - A registry of live, authenticated connections
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │              (accept loop, thread per client)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Connection                                │
//! │        (buffered stream → codec → handshake/dispatch)        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────┐
//!   │  Registry   │          │ QueryHandler │
//!   │  (RwLock)   │          │  (external)  │
//!   └─────────────┘          └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod handler;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{HandlerError, Result, TinySqlError};
pub use config::{ClientConfig, ServerConfig};
pub use handler::{AckHandler, QueryHandler};
pub use client::Client;
pub use network::Server;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of TinySQL
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
