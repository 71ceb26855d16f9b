//! Client
//!
//! Client side of the protocol plus the `;`-terminated statement reader
//! used by the interactive CLI.

use std::io::BufRead;
use std::net::TcpStream;

use bytes::Bytes;

use crate::config::ClientConfig;
use crate::error::{Result, TinySqlError};
use crate::network::{client_handshake, CancelToken, MessageStream};
use crate::protocol::{Message, MessageType};

/// A connected, handshaken client
pub struct Client {
    stream: MessageStream,
    user: String,
    cancel: CancelToken,
}

impl Client {
    /// Connect to the server and perform the handshake
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let socket = TcpStream::connect(&config.server_addr)?;
        socket.set_nodelay(true)?;
        Self::handshake(socket, config)
    }

    /// Run the handshake over an already connected socket
    pub fn handshake(socket: TcpStream, config: &ClientConfig) -> Result<Self> {
        let mut stream = MessageStream::new(socket, config.max_frame_size)?;
        let cancel = CancelToken::new();
        client_handshake(&mut stream, &config.user, &cancel)?;

        tracing::debug!("connected to {} as {}", stream.peer_addr(), config.user);
        Ok(Self {
            stream,
            user: config.user.clone(),
            cancel,
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Buffer and flush one message
    pub fn send_message(&mut self, msg_type: MessageType, content: impl Into<Bytes>) -> Result<()> {
        self.stream.send_message(msg_type, content)?;
        self.stream.flush()
    }

    pub fn receive_message(&mut self) -> Result<Message> {
        self.stream.read_message(&self.cancel)
    }

    /// Send a query and wait for its Data reply
    ///
    /// Only one request is ever outstanding: this does not return until
    /// the reply has been read.
    ///
    /// A query the server failed to run still comes back as `Ok`: the
    /// payload is the server's error text prefixed with `ERROR: `. The
    /// protocol has no separate error message type, so a result that
    /// genuinely starts with that prefix looks the same.
    pub fn query(&mut self, text: &str) -> Result<Bytes> {
        self.send_message(MessageType::Query, Bytes::copy_from_slice(text.as_bytes()))?;

        let reply = self.receive_message()?;
        if reply.msg_type != MessageType::Data {
            return Err(TinySqlError::ProtocolViolation(format!(
                "expected Data reply, got {:?}",
                reply.msg_type
            )));
        }
        Ok(reply.content)
    }

    /// Say goodbye and close the socket
    pub fn exit(mut self) -> Result<()> {
        self.send_message(MessageType::Exit, Bytes::new())?;
        self.stream.shutdown()
    }
}

// =============================================================================
// Statement Input
// =============================================================================

/// One parsed line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Exit,
    Query(String),
}

/// Classify raw input; `None` for blank input
pub fn parse_statement(raw: &str) -> Option<Statement> {
    let content = raw.trim_matches(|c| c == '\r' || c == '\n');
    if content.is_empty() {
        return None;
    }
    if content.eq_ignore_ascii_case("exit;") {
        return Some(Statement::Exit);
    }
    Some(Statement::Query(content.to_string()))
}

/// Read input up to and including the next `;`
///
/// Returns `None` at end of input. Trailing text without a `;` at EOF is
/// returned as-is.
pub fn read_statement<R: BufRead>(reader: &mut R) -> std::io::Result<Option<String>> {
    let mut buf = Vec::new();
    let n = reader.read_until(b';', &mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}
