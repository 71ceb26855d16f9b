//! Query Handler
//!
//! The collaborator that turns query text into a result payload. The
//! server owns no query engine of its own; it hands every Query message
//! to a [`QueryHandler`] and ships the result back as a Data message.

use bytes::Bytes;

use crate::error::HandlerError;
use crate::network::Session;

/// Reply produced by [`AckHandler`] for every query
pub const ACK_REPLY: &str = "the query has been completed";

/// Executes queries on behalf of a session
pub trait QueryHandler: Send + Sync {
    /// Run `query` for `session` and return the result payload
    fn handle(&self, session: &Session, query: &str) -> Result<Bytes, HandlerError>;
}

/// Acknowledges every query without executing it
#[derive(Debug, Default, Clone, Copy)]
pub struct AckHandler;

impl QueryHandler for AckHandler {
    fn handle(&self, session: &Session, query: &str) -> Result<Bytes, HandlerError> {
        tracing::info!(user = session.user(), db = session.database(), "sql: {}", query);
        Ok(Bytes::from_static(ACK_REPLY.as_bytes()))
    }
}

impl<F> QueryHandler for F
where
    F: Fn(&Session, &str) -> Result<Bytes, HandlerError> + Send + Sync,
{
    fn handle(&self, session: &Session, query: &str) -> Result<Bytes, HandlerError> {
        self(session, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_handler_replies_fixed_text() {
        let session = Session::open("root", "test");
        let reply = AckHandler.handle(&session, "select 1;").unwrap();
        assert_eq!(&reply[..], ACK_REPLY.as_bytes());
    }

    #[test]
    fn test_closure_handler() {
        let handler = |_: &Session, q: &str| -> Result<Bytes, HandlerError> {
            if q.is_empty() {
                Err(HandlerError::new("empty query"))
            } else {
                Ok(Bytes::from(q.to_uppercase()))
            }
        };
        let session = Session::open("root", "test");
        assert_eq!(&handler.handle(&session, "abc").unwrap()[..], b"ABC");
        assert!(handler.handle(&session, "").is_err());
    }
}
