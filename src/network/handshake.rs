//! Handshake
//!
//! The fixed opening exchange of every connection:
//!
//! ```text
//!   AwaitingStartup ──STARTUP──▶ Authenticated
//!         │
//!         └──anything else──▶ Rejected
//! ```
//!
//! No credentials are checked; the user in the Startup message is taken
//! as given.

use crate::error::{Result, TinySqlError};
use crate::protocol::MessageType;
use super::{CancelToken, ConnContext, Connection, MessageStream};

/// Handshake progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    AwaitingStartup,
    Authenticated,
    Rejected,
}

/// Server side of the handshake for one freshly accepted connection
pub struct Handshake<'a> {
    conn: &'a mut Connection,
    state: HandshakeState,
}

impl<'a> Handshake<'a> {
    pub fn new(conn: &'a mut Connection) -> Self {
        Self {
            conn,
            state: HandshakeState::AwaitingStartup,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Drive the state machine to `Authenticated` or `Rejected`
    pub fn run(&mut self, ctx: &ConnContext, default_database: &str) -> Result<HandshakeState> {
        if self.state != HandshakeState::AwaitingStartup {
            return Ok(self.state);
        }

        match self.accept_startup(ctx, default_database) {
            Ok(()) => {
                self.state = HandshakeState::Authenticated;
                Ok(self.state)
            }
            Err(e) => {
                self.state = HandshakeState::Rejected;
                Err(e)
            }
        }
    }

    fn accept_startup(&mut self, ctx: &ConnContext, default_database: &str) -> Result<()> {
        let message = self.conn.read_message(ctx)?;

        if message.msg_type != MessageType::Startup {
            return Err(TinySqlError::ProtocolViolation(format!(
                "first message must be Startup, got {:?}",
                message.msg_type
            )));
        }

        let user = message.text();
        tracing::debug!(conn = %ctx.id(), "startup from {} as user {:?}", self.conn.peer_addr(), user);
        self.conn.set_identity(user, default_database.to_string());

        self.conn.send_message(MessageType::Complete, bytes::Bytes::new())?;
        self.conn.flush()?;

        self.conn.open_session()?;
        Ok(())
    }
}

/// Run the server side of the handshake on `conn`
pub fn server_handshake(conn: &mut Connection, ctx: &ConnContext, default_database: &str) -> Result<()> {
    Handshake::new(conn).run(ctx, default_database).map(|_| ())
}

/// Run the client side of the handshake: send Startup, wait for Complete
///
/// Single attempt; any other reply is fatal.
pub fn client_handshake(stream: &mut MessageStream, user: &str, cancel: &CancelToken) -> Result<()> {
    stream.send_message(MessageType::Startup, bytes::Bytes::copy_from_slice(user.as_bytes()))?;
    stream.flush()?;

    let reply = stream.read_message(cancel)?;
    if reply.msg_type != MessageType::Complete {
        return Err(TinySqlError::ProtocolViolation(format!(
            "expected Complete during handshake, got {:?}",
            reply.msg_type
        )));
    }
    Ok(())
}
