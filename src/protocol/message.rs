//! Message definitions
//!
//! The unit of exchange between client and server.

use bytes::Bytes;

use crate::error::TinySqlError;
use super::HEADER_SIZE;

/// Message type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Startup = 0x01,
    Complete = 0x02,
    Query = 0x03,
    Exit = 0x04,
    Data = 0x05,
}

impl TryFrom<u8> for MessageType {
    type Error = TinySqlError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0x01 => Ok(MessageType::Startup),
            0x02 => Ok(MessageType::Complete),
            0x03 => Ok(MessageType::Query),
            0x04 => Ok(MessageType::Exit),
            0x05 => Ok(MessageType::Data),
            _ => Err(TinySqlError::ProtocolViolation(format!(
                "unknown message type: 0x{:02x}",
                tag
            ))),
        }
    }
}

/// A single protocol message
///
/// The wire length is always derived from the content, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Type tag
    pub msg_type: MessageType,

    /// Opaque payload, interpreted according to `msg_type`
    pub content: Bytes,
}

impl Message {
    pub fn new(msg_type: MessageType, content: impl Into<Bytes>) -> Self {
        Self {
            msg_type,
            content: content.into(),
        }
    }

    /// Startup carrying the user identity
    pub fn startup(user: &str) -> Self {
        Self::new(MessageType::Startup, Bytes::copy_from_slice(user.as_bytes()))
    }

    /// Empty handshake acknowledgement
    pub fn complete() -> Self {
        Self::new(MessageType::Complete, Bytes::new())
    }

    pub fn query(text: &str) -> Self {
        Self::new(MessageType::Query, Bytes::copy_from_slice(text.as_bytes()))
    }

    pub fn exit() -> Self {
        Self::new(MessageType::Exit, Bytes::new())
    }

    pub fn data(payload: impl Into<Bytes>) -> Self {
        Self::new(MessageType::Data, payload)
    }

    /// Total encoded size: length field + type byte + content.
    ///
    /// Saturates at `u32::MAX`; the encoder refuses such content anyway.
    pub fn length(&self) -> u32 {
        u32::try_from(HEADER_SIZE + self.content.len()).unwrap_or(u32::MAX)
    }

    /// Content as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}
