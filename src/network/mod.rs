//! Network Module
//!
//! TCP server, per-connection state and the client-side stream.
//!
//! ## Architecture
//! - Single acceptor thread
//! - One OS thread per accepted connection (optionally capped)
//! - Handshake before registration; registry entry dropped on close

mod context;
mod stream;
mod session;
mod connection;
mod handshake;
mod registry;
mod server;

pub use context::{CancelToken, ConnContext, ConnectionId, IdAllocator};
pub use stream::{MessageStream, WRITE_BUFFER_SIZE};
pub use session::Session;
pub use connection::Connection;
pub use handshake::{client_handshake, server_handshake, Handshake, HandshakeState};
pub use registry::{ConnectionHandle, ConnectionInfo, Registration, Registry};
pub use server::{Server, ShutdownHandle};
