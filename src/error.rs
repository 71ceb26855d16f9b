//! Error types for TinySQL
//!
//! Provides a unified error type for the protocol, connection and client layers.

use std::io::ErrorKind;

use thiserror::Error;

/// Result type alias using TinySqlError
pub type Result<T> = std::result::Result<T, TinySqlError>;

/// Unified error type for TinySQL operations
#[derive(Debug, Error)]
pub enum TinySqlError {
    // -------------------------------------------------------------------------
    // Wire Errors
    // -------------------------------------------------------------------------
    /// Malformed length/type/content boundaries
    #[error("framing error: {0}")]
    Framing(String),

    /// Underlying stream read/write failure
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Well-framed message arriving in the wrong state
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    // -------------------------------------------------------------------------
    // Query Errors
    // -------------------------------------------------------------------------
    #[error("query handler error: {0}")]
    Handler(#[from] HandlerError),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("connection cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

impl TinySqlError {
    /// Whether this error must tear down the connection it occurred on.
    pub fn is_fatal(&self) -> bool {
        self.is_stream_broken() || matches!(self, TinySqlError::ProtocolViolation(_))
    }

    /// Whether the byte stream itself can no longer be used.
    ///
    /// A protocol violation arrives in a whole frame, so the stream stays
    /// in sync; framing and transport failures leave it unusable.
    pub fn is_stream_broken(&self) -> bool {
        matches!(
            self,
            TinySqlError::Framing(_) | TinySqlError::Transport(_) | TinySqlError::Cancelled
        )
    }

    /// Whether this error means the peer simply went away.
    pub fn is_disconnect(&self) -> bool {
        match self {
            TinySqlError::Transport(e) => matches!(
                e.kind(),
                ErrorKind::UnexpectedEof
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Failure reported by a query handler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
