//! Buffered message stream
//!
//! Wraps a TCP socket with buffered reads and writes and speaks whole
//! protocol messages. Used by both the server connection and the client.

use std::io::{BufReader, BufWriter, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Instant;

use bytes::Bytes;

use crate::error::{Result, TinySqlError};
use crate::protocol::{decode_with_limit, write_message, Message, MessageType};
use super::CancelToken;

/// Write buffer size (16 KB)
pub const WRITE_BUFFER_SIZE: usize = 16 * 1024;

/// Framed, buffered view of one TCP socket
pub struct MessageStream {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered; flushed only on request)
    writer: BufWriter<TcpStream>,

    /// Peer address for logging
    peer_addr: String,

    /// Largest frame accepted from the peer
    max_frame_size: u32,

    /// Time of the last successful read
    last_active: Instant,
}

impl MessageStream {
    /// Wrap a connected socket
    pub fn new(stream: TcpStream, max_frame_size: u32) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::with_capacity(WRITE_BUFFER_SIZE, write_stream),
            peer_addr,
            max_frame_size,
            last_active: Instant::now(),
        })
    }

    /// Block until a whole message arrives
    ///
    /// Fails fast with `Cancelled` if the token already fired.
    pub fn read_message(&mut self, cancel: &CancelToken) -> Result<Message> {
        if cancel.is_cancelled() {
            return Err(TinySqlError::Cancelled);
        }

        let message = decode_with_limit(&mut self.reader, self.max_frame_size)?;
        self.last_active = Instant::now();
        Ok(message)
    }

    /// Buffer a message for sending; call [`flush`](Self::flush) to transmit
    pub fn send_message(&mut self, msg_type: MessageType, content: impl Into<Bytes>) -> Result<()> {
        write_message(&mut self.writer, &Message::new(msg_type, content))
    }

    /// Force buffered bytes onto the socket
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Close both directions of the socket
    pub fn shutdown(&self) -> Result<()> {
        match self.reader.get_ref().shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // Already torn down by the peer
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Another handle to the underlying socket
    pub fn try_clone_socket(&self) -> Result<TcpStream> {
        Ok(self.reader.get_ref().try_clone()?)
    }

    pub fn last_active(&self) -> Instant {
        self.last_active
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
