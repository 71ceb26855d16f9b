//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Frame Format
//! ```text
//! ┌──────────────┬──────────┬─────────────────────────────┐
//! │ Length (4)   │ Type (1) │     Content (Length - 5)    │
//! └──────────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Message Types
//! - 0x01: STARTUP  - Content: user name
//! - 0x02: COMPLETE - Content: empty
//! - 0x03: QUERY    - Content: query text
//! - 0x04: EXIT     - Content: empty
//! - 0x05: DATA     - Content: result payload
//!
//! ### Exchange
//! ```text
//! client                      server
//!   │ ── STARTUP(user) ──────▶  │
//!   │ ◀───────────── COMPLETE ── │
//!   │ ── QUERY(text) ────────▶  │
//!   │ ◀────────── DATA(result) ── │
//!   │ ── EXIT ───────────────▶  │
//! ```

mod message;
mod codec;

pub use message::{Message, MessageType};
pub use codec::{
    decode, decode_with_limit, encode, encode_into, write_message, HEADER_SIZE, MAX_FRAME_SIZE,
};
