//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//! ```text
//! ┌──────────────┬──────────┬─────────────────────────────┐
//! │ Length (4)   │ Type (1) │     Content (Length - 5)    │
//! └──────────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! `Length` is big-endian and counts itself, the type byte and the content.

use std::io::{Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, TinySqlError};
use super::{Message, MessageType};

/// Header size: 4 bytes length + 1 byte type
pub const HEADER_SIZE: usize = 5;

/// Default maximum frame size, header included (16 MB)
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Encoding
// =============================================================================

/// Encode a message to bytes
///
/// Format: length (4) + type (1) + content
pub fn encode(message: &Message) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + message.content.len());
    encode_into(message, &mut buf)?;
    Ok(buf.freeze())
}

/// Append an encoded message to `dst`
pub fn encode_into(message: &Message, dst: &mut BytesMut) -> Result<()> {
    if message.content.len() > u32::MAX as usize - HEADER_SIZE {
        return Err(TinySqlError::Framing(format!(
            "content too large to frame: {} bytes",
            message.content.len()
        )));
    }
    let length = (HEADER_SIZE + message.content.len()) as u32;

    dst.reserve(length as usize);
    dst.put_u32(length);
    dst.put_u8(message.msg_type as u8);
    dst.put_slice(&message.content);
    Ok(())
}

/// Write an encoded message to a stream
///
/// Does not flush; callers decide when buffered bytes hit the wire.
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<()> {
    let bytes = encode(message)?;
    writer.write_all(&bytes)?;
    Ok(())
}

// =============================================================================
// Decoding
// =============================================================================

/// Read one complete message from a stream using the default frame bound
///
/// Blocks until the whole frame has arrived or the stream fails.
pub fn decode<R: Read>(reader: &mut R) -> Result<Message> {
    decode_with_limit(reader, MAX_FRAME_SIZE)
}

/// Read one complete message, rejecting frames larger than `max_frame_size`
pub fn decode_with_limit<R: Read>(reader: &mut R, max_frame_size: u32) -> Result<Message> {
    let mut length_buf = [0u8; 4];
    reader.read_exact(&mut length_buf)?;
    let length = u32::from_be_bytes(length_buf);

    // Validate before touching the body
    if (length as usize) < HEADER_SIZE {
        return Err(TinySqlError::Framing(format!(
            "frame length {} is shorter than the {}-byte header",
            length, HEADER_SIZE
        )));
    }
    if length > max_frame_size {
        return Err(TinySqlError::Framing(format!(
            "frame too large: {} bytes (max {})",
            length, max_frame_size
        )));
    }

    let mut type_buf = [0u8; 1];
    reader.read_exact(&mut type_buf)?;

    let mut content = vec![0u8; length as usize - HEADER_SIZE];
    if !content.is_empty() {
        reader.read_exact(&mut content)?;
    }

    // The body is consumed first so a bad tag never leaves half a frame behind
    let msg_type = MessageType::try_from(type_buf[0])?;

    Ok(Message {
        msg_type,
        content: Bytes::from(content),
    })
}
