//! Shared helpers for integration tests

#![allow(dead_code)]

use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tinysql::network::{Registry, ShutdownHandle};
use tinysql::protocol::{decode, encode, Message};
use tinysql::{QueryHandler, Server, ServerConfig};

// =============================================================================
// Server Harness
// =============================================================================

/// A server running on its own thread, bound to an ephemeral port
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Arc<Registry>,
    pub shutdown: ShutdownHandle,
    thread: Option<JoinHandle<tinysql::Result<()>>>,
}

impl TestServer {
    pub fn start(handler: Arc<dyn QueryHandler>) -> Self {
        Self::start_with(ServerConfig::builder(), handler)
    }

    pub fn start_with(builder: tinysql::config::ServerConfigBuilder, handler: Arc<dyn QueryHandler>) -> Self {
        let config = builder.listen_addr("127.0.0.1:0").build().unwrap();
        let server = Server::bind(config, handler).unwrap();
        let addr = server.local_addr();
        let registry = server.registry();
        let shutdown = server.shutdown_handle();
        let thread = thread::spawn(move || server.run());

        Self {
            addr,
            registry,
            shutdown,
            thread: Some(thread),
        }
    }

    pub fn client_config(&self, user: &str) -> tinysql::ClientConfig {
        tinysql::ClientConfig::builder()
            .server_addr(self.addr.to_string())
            .user(user)
            .build()
            .unwrap()
    }

    /// Stop the server and wait for the accept loop to exit
    pub fn stop(mut self) {
        self.shutdown.shutdown();
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap().unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.shutdown();
    }
}

// =============================================================================
// Raw Socket Helpers
// =============================================================================

pub fn raw_connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream
}

pub fn send(stream: &mut TcpStream, message: &Message) {
    stream.write_all(&encode(message).unwrap()).unwrap();
}

pub fn recv(stream: &mut TcpStream) -> tinysql::Result<Message> {
    decode(stream)
}

/// Poll `condition` until it holds or five seconds pass
pub fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}
