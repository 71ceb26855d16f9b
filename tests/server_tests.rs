//! Server Tests
//!
//! These tests verify, over real loopback sockets:
//! - Handshake ordering and rejection
//! - Registry admission and removal
//! - Connection id uniqueness
//! - Query dispatch, handler failures and reply ordering
//! - Malformed frames, shutdown and admission control

mod common;

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use common::{raw_connect, recv, send, wait_until, TestServer};
use tinysql::handler::ACK_REPLY;
use tinysql::network::{ConnectionId, Session};
use tinysql::protocol::{Message, MessageType};
use tinysql::{AckHandler, Client, HandlerError, ServerConfig, TinySqlError};

fn echo_handler() -> Arc<dyn tinysql::QueryHandler> {
    Arc::new(|_: &Session, q: &str| -> Result<Bytes, HandlerError> {
        if q.starts_with("bad") {
            Err(HandlerError::new("no such table"))
        } else {
            Ok(Bytes::from(format!("echo {}", q)))
        }
    })
}

// =============================================================================
// Handshake Tests
// =============================================================================

#[test]
fn test_handshake_replies_empty_complete() {
    let server = TestServer::start(Arc::new(AckHandler));
    let mut stream = raw_connect(server.addr);

    send(&mut stream, &Message::startup("root"));
    let reply = recv(&mut stream).unwrap();

    assert_eq!(reply.msg_type, MessageType::Complete);
    assert!(reply.content.is_empty());
    assert_eq!(reply.length(), 5);
    assert!(wait_until(|| server.registry.len() == 1));

    server.stop();
}

#[test]
fn test_non_startup_first_message_is_rejected() {
    let server = TestServer::start(Arc::new(AckHandler));
    let mut stream = raw_connect(server.addr);

    send(&mut stream, &Message::query("select 1;"));

    // Server tears the connection down without replying
    assert!(recv(&mut stream).is_err());
    assert!(server.registry.is_empty());

    server.stop();
}

#[test]
fn test_short_length_prefix_closes_connection() {
    let server = TestServer::start(Arc::new(AckHandler));
    let mut stream = raw_connect(server.addr);

    stream.write_all(&3u32.to_be_bytes()).unwrap();

    assert!(recv(&mut stream).is_err());
    assert!(server.registry.is_empty());

    server.stop();
}

#[test]
fn test_unknown_type_tag_during_handshake() {
    let server = TestServer::start(Arc::new(AckHandler));
    let mut stream = raw_connect(server.addr);

    stream.write_all(&[0, 0, 0, 6, 0x7f, b'x']).unwrap();

    assert!(recv(&mut stream).is_err());
    assert!(server.registry.is_empty());

    server.stop();
}

#[test]
fn test_oversized_frame_closes_connection() {
    let server = TestServer::start_with(ServerConfig::builder().max_frame_size(64), Arc::new(AckHandler));
    let mut client = Client::connect(&server.client_config("root")).unwrap();
    assert!(wait_until(|| server.registry.len() == 1));

    let huge = "x".repeat(100);
    assert!(client.query(&huge).is_err());
    assert!(wait_until(|| server.registry.is_empty()));

    server.stop();
}

// =============================================================================
// Registry Tests
// =============================================================================

#[test]
fn test_registry_tracks_identity() {
    let server = TestServer::start_with(ServerConfig::builder().default_database("shop"), Arc::new(AckHandler));
    let client = Client::connect(&server.client_config("alice")).unwrap();

    assert!(wait_until(|| server.registry.len() == 1));
    let info = server.registry.snapshot().remove(0);
    assert_eq!(info.user, "alice");
    assert_eq!(info.database, "shop");

    client.exit().unwrap();
    assert!(wait_until(|| server.registry.is_empty()));

    server.stop();
}

#[test]
fn test_registry_entry_removed_on_abrupt_disconnect() {
    let server = TestServer::start(Arc::new(AckHandler));
    let mut stream = raw_connect(server.addr);
    send(&mut stream, &Message::startup("root"));
    recv(&mut stream).unwrap();
    assert!(wait_until(|| server.registry.len() == 1));

    drop(stream);

    assert!(wait_until(|| server.registry.is_empty()));
    server.stop();
}

#[test]
fn test_concurrent_connections_get_distinct_ids() {
    const CLIENTS: usize = 16;

    let server = TestServer::start(Arc::new(AckHandler));
    let config = server.client_config("root");

    let handles: Vec<_> = (0..CLIENTS)
        .map(|_| {
            let config = config.clone();
            thread::spawn(move || Client::connect(&config).unwrap())
        })
        .collect();
    let clients: Vec<Client> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(wait_until(|| server.registry.len() == CLIENTS));
    let first_ids: HashSet<ConnectionId> = server.registry.ids().into_iter().collect();
    assert_eq!(first_ids.len(), CLIENTS);

    for client in clients {
        client.exit().unwrap();
    }
    assert!(wait_until(|| server.registry.is_empty()));

    // Ids are never handed out twice
    let _again = Client::connect(&config).unwrap();
    assert!(wait_until(|| server.registry.len() == 1));
    let new_id = server.registry.ids()[0];
    assert!(!first_ids.contains(&new_id));
    assert!(first_ids.iter().all(|id| *id < new_id));

    server.stop();
}

// =============================================================================
// Dispatch Tests
// =============================================================================

#[test]
fn test_query_gets_ack() {
    let server = TestServer::start(Arc::new(AckHandler));
    let mut client = Client::connect(&server.client_config("root")).unwrap();

    let reply = client.query("select 1;").unwrap();
    assert_eq!(&reply[..], ACK_REPLY.as_bytes());

    client.exit().unwrap();
    server.stop();
}

#[test]
fn test_handler_sees_session_identity() {
    let handler = |s: &Session, _: &str| -> Result<Bytes, HandlerError> {
        Ok(Bytes::from(format!("{}@{} #{}", s.user(), s.database(), s.queries())))
    };
    let server = TestServer::start(Arc::new(handler));
    let mut client = Client::connect(&server.client_config("bob")).unwrap();

    assert_eq!(&client.query("a;").unwrap()[..], b"bob@test #1");
    assert_eq!(&client.query("b;").unwrap()[..], b"bob@test #2");

    client.exit().unwrap();
    server.stop();
}

#[test]
fn test_handler_error_keeps_session_alive() {
    let server = TestServer::start(echo_handler());
    let mut client = Client::connect(&server.client_config("root")).unwrap();

    let reply = client.query("bad query;").unwrap();
    assert!(reply.starts_with(b"ERROR: "));
    assert!(String::from_utf8_lossy(&reply).contains("no such table"));

    let reply = client.query("select 1;").unwrap();
    assert_eq!(&reply[..], b"echo select 1;");
    assert_eq!(server.registry.len(), 1);

    client.exit().unwrap();
    server.stop();
}

#[test]
fn test_pipelined_queries_answered_in_order() {
    let server = TestServer::start(echo_handler());
    let mut stream = raw_connect(server.addr);
    send(&mut stream, &Message::startup("root"));
    assert_eq!(recv(&mut stream).unwrap().msg_type, MessageType::Complete);

    // Second query sent before the first reply is read
    send(&mut stream, &Message::query("q1;"));
    send(&mut stream, &Message::query("q2;"));

    let first = recv(&mut stream).unwrap();
    let second = recv(&mut stream).unwrap();
    assert_eq!(first, Message::data("echo q1;"));
    assert_eq!(second, Message::data("echo q2;"));

    send(&mut stream, &Message::exit());
    assert!(wait_until(|| server.registry.is_empty()));
    server.stop();
}

#[test]
fn test_unexpected_type_after_handshake_closes_connection() {
    let server = TestServer::start(Arc::new(AckHandler));
    let mut stream = raw_connect(server.addr);
    send(&mut stream, &Message::startup("root"));
    recv(&mut stream).unwrap();
    assert!(wait_until(|| server.registry.len() == 1));

    send(&mut stream, &Message::data("unsolicited"));

    assert!(recv(&mut stream).is_err());
    assert!(wait_until(|| server.registry.is_empty()));
    server.stop();
}

#[test]
fn test_second_startup_is_a_protocol_violation() {
    let server = TestServer::start(Arc::new(AckHandler));
    let mut stream = raw_connect(server.addr);
    send(&mut stream, &Message::startup("root"));
    recv(&mut stream).unwrap();

    send(&mut stream, &Message::startup("root"));

    assert!(recv(&mut stream).is_err());
    assert!(wait_until(|| server.registry.is_empty()));
    server.stop();
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_shutdown_cancels_live_connections() {
    let server = TestServer::start(Arc::new(AckHandler));
    let mut client = Client::connect(&server.client_config("root")).unwrap();
    assert!(wait_until(|| server.registry.len() == 1));

    let registry = Arc::clone(&server.registry);
    server.stop();

    assert!(wait_until(|| registry.is_empty()));
    assert!(client.query("select 1;").is_err());
}

#[test]
fn test_registry_cancel_single_connection() {
    let server = TestServer::start(Arc::new(AckHandler));
    let mut keep = Client::connect(&server.client_config("keep")).unwrap();
    let mut kill = Client::connect(&server.client_config("kill")).unwrap();
    assert!(wait_until(|| server.registry.len() == 2));

    let victim = server
        .registry
        .snapshot()
        .into_iter()
        .find(|i| i.user == "kill")
        .unwrap();
    assert!(server.registry.cancel(victim.id));

    assert!(wait_until(|| server.registry.len() == 1));
    assert!(kill.query("select 1;").is_err());
    assert!(keep.query("select 1;").is_ok());

    keep.exit().unwrap();
    server.stop();
}

#[test]
fn test_max_connections_rejects_extra_clients() {
    let server = TestServer::start_with(ServerConfig::builder().max_connections(1), Arc::new(AckHandler));
    let first = Client::connect(&server.client_config("first")).unwrap();
    assert!(wait_until(|| server.registry.len() == 1));

    let err = Client::connect(&server.client_config("second")).err().unwrap();
    assert!(matches!(err, TinySqlError::Transport(_)));

    first.exit().unwrap();
    assert!(wait_until(|| server.registry.is_empty()));

    // Slot is free again once the first connection thread has finished
    let config = server.client_config("third");
    assert!(wait_until(|| Client::connect(&config).is_ok()));

    server.stop();
}

#[test]
fn test_panicking_handler_releases_admission_slot() {
    let handler = |_: &Session, q: &str| -> Result<Bytes, HandlerError> {
        if q == "boom;" {
            panic!("handler blew up");
        }
        Ok(Bytes::from_static(b"ok"))
    };
    let server = TestServer::start_with(ServerConfig::builder().max_connections(1), Arc::new(handler));
    let config = server.client_config("root");

    let mut client = Client::connect(&config).unwrap();
    assert!(client.query("boom;").is_err());
    assert!(wait_until(|| server.registry.is_empty()));

    // The dead thread must not keep holding the only slot
    assert!(wait_until(|| match Client::connect(&config) {
        Ok(mut c) => c.query("select 1;").map(|r| &r[..] == b"ok").unwrap_or(false),
        Err(_) => false,
    }));

    server.stop();
}

#[test]
fn test_shutdown_closes_connections_mid_handshake() {
    let server = TestServer::start(Arc::new(AckHandler));

    // Connected, but never sends Startup
    let mut stream = raw_connect(server.addr);
    thread::sleep(Duration::from_millis(100));

    server.stop();

    // Closed by the server, not timed out waiting
    let err = recv(&mut stream).unwrap_err();
    assert!(err.is_disconnect(), "expected disconnect, got {}", err);
}
