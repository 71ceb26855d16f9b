//! Connection Handler
//!
//! Server side of a single client connection: identity, session and the
//! query dispatch loop.

use std::net::TcpStream;
use std::time::Instant;

use bytes::Bytes;

use crate::error::{Result, TinySqlError};
use crate::handler::QueryHandler;
use crate::protocol::{Message, MessageType};
use super::{ConnContext, ConnectionId, MessageStream, Session};

/// Handles a single client connection
///
/// Created unauthenticated on accept. The handshake fills in the user and
/// database and opens the session; [`serve`](Self::serve) then runs until
/// the client exits or the stream fails. Dropping the connection closes
/// the socket.
pub struct Connection {
    id: ConnectionId,
    stream: MessageStream,
    user: Option<String>,
    database: Option<String>,
    session: Option<Session>,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(id: ConnectionId, stream: TcpStream, max_frame_size: u32) -> Result<Self> {
        Ok(Self {
            id,
            stream: MessageStream::new(stream, max_frame_size)?,
            user: None,
            database: None,
            session: None,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn peer_addr(&self) -> &str {
        self.stream.peer_addr()
    }

    pub fn last_active(&self) -> Instant {
        self.stream.last_active()
    }

    pub(crate) fn set_identity(&mut self, user: String, database: String) {
        self.user = Some(user);
        self.database = Some(database);
    }

    /// Open the session for the handshaken identity; only once per connection
    pub(crate) fn open_session(&mut self) -> Result<&Session> {
        if self.session.is_some() {
            return Err(TinySqlError::ProtocolViolation(
                "session already open".to_string(),
            ));
        }
        let (Some(user), Some(database)) = (&self.user, &self.database) else {
            return Err(TinySqlError::ProtocolViolation(
                "session opened before handshake".to_string(),
            ));
        };
        Ok(self.session.insert(Session::open(user.clone(), database.clone())))
    }

    pub fn read_message(&mut self, ctx: &ConnContext) -> Result<Message> {
        self.stream.read_message(ctx.cancel_token())
    }

    /// Buffer a message; not sent until [`flush`](Self::flush)
    pub fn send_message(&mut self, msg_type: MessageType, content: impl Into<Bytes>) -> Result<()> {
        self.stream.send_message(msg_type, content)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.stream.flush()
    }

    /// Another handle to the socket, used to interrupt blocked reads
    pub fn try_clone_socket(&self) -> Result<TcpStream> {
        self.stream.try_clone_socket()
    }

    /// Close the connection and its socket
    pub fn close(self) -> Result<()> {
        self.stream.shutdown()
    }

    /// Run the query dispatch loop (blocking until closed)
    ///
    /// Returns `Ok` when the client sends Exit. Read failures and
    /// unexpected message types end the loop with an error; handler
    /// failures are logged and answered without ending it.
    pub fn serve(&mut self, ctx: &ConnContext, handler: &dyn QueryHandler) -> Result<()> {
        if self.session.is_none() {
            return Err(TinySqlError::ProtocolViolation(
                "query loop entered before handshake".to_string(),
            ));
        }

        loop {
            let message = self.read_message(ctx)?;

            tracing::trace!(conn = %self.id, "received {:?} ({} bytes)", message.msg_type, message.length());

            match message.msg_type {
                MessageType::Query => self.handle_query(&message, handler)?,
                MessageType::Exit => {
                    tracing::debug!(conn = %self.id, "client {} sent exit", self.peer_addr());
                    return Ok(());
                }
                other => {
                    return Err(TinySqlError::ProtocolViolation(format!(
                        "unexpected {:?} message after handshake",
                        other
                    )));
                }
            }
        }
    }

    /// Run one query and send its Data reply
    fn handle_query(&mut self, message: &Message, handler: &dyn QueryHandler) -> Result<()> {
        let query = message.text();
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| TinySqlError::ProtocolViolation("no open session".to_string()))?;
        session.record_query();

        let reply = match handler.handle(session, &query) {
            Ok(payload) => payload,
            Err(e) => {
                // One bad query must not drop the session; the client still
                // gets exactly one reply for its request.
                tracing::warn!(
                    conn = %self.id,
                    "failed to handle query {:?}: {}",
                    query,
                    TinySqlError::from(e.clone())
                );
                Bytes::from(format!("ERROR: {}", e))
            }
        };

        self.send_message(MessageType::Data, reply)?;
        self.flush()
    }
}
