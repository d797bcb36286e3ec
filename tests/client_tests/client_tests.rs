//! Tests for Client
//!
//! These tests verify:
//! - Construction, identity and port validation
//! - Command issuance and text parsing
//! - Transparent single-shot reconnection
//! - The broken state after a failed reconnection
//! - Close semantics

#[path = "../common/mod.rs"]
mod common;

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use crossbeam::channel;

use common::{test_config, unused_port, MockServer};
use kvwire::network::Recovery;
use kvwire::{Client, ClientError, Command, Config, Response};

// =============================================================================
// Helper Functions
// =============================================================================

fn connect(server: &MockServer) -> Client {
    Client::connect("127.0.0.1", server.port(), test_config()).unwrap()
}

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn test_connect_and_ping() {
    let server = MockServer::start();
    let client = connect(&server);

    assert_eq!(client.send(&Command::new("PING")), Response::Str("PONG".into()));
    assert_eq!(client.endpoint().port() as i32, server.port());
}

#[test]
fn test_connect_localhost() {
    let server = MockServer::start();
    let client = Client::connect("localhost", server.port(), test_config());

    // localhost may resolve to ::1 first; the IPv4 address is tried next
    assert!(client.is_ok());
}

#[test]
fn test_connect_invalid_port() {
    let result = Client::connect("localhost", -1, test_config());

    match result {
        Err(ClientError::Connect { reason, .. }) => assert!(reason.contains("invalid port")),
        Err(other) => panic!("Expected Connect error, got {:?}", other),
        Ok(_) => panic!("Expected Connect error, got a client"),
    }
}

#[test]
fn test_connect_refused() {
    let result = Client::connect("127.0.0.1", unused_port(), test_config());
    assert!(matches!(result, Err(ClientError::Connect { .. })));
}

#[test]
fn test_connect_handshake_rejected() {
    let server = MockServer::rejecting("too many clients");
    let result = Client::connect("127.0.0.1", server.port(), test_config());

    assert!(matches!(result, Err(ClientError::Handshake(ref m)) if m == "too many clients"));
}

#[test]
fn test_generated_identity() {
    let server = MockServer::start();
    let first = connect(&server);
    let second = connect(&server);

    assert_eq!(first.id().len(), 36);
    assert_ne!(first.id(), second.id());
    assert_eq!(server.handshakes()[0], (first.id().to_string(), "command".to_string()));
}

#[test]
fn test_explicit_identity() {
    let server = MockServer::start();
    let config = Config::builder().session_id("my-client").build();
    let client = Client::connect("127.0.0.1", server.port(), config).unwrap();

    assert_eq!(client.id(), "my-client");
    assert_eq!(server.handshakes(), vec![("my-client".to_string(), "command".to_string())]);
}

// =============================================================================
// Command Tests
// =============================================================================

#[test]
fn test_send_text() {
    let server = MockServer::start();
    let client = connect(&server);

    assert_eq!(client.send_text("  ECHO hello   world "), Response::Str("hello world".into()));
    assert_eq!(client.send_text("PING"), Response::Str("PONG".into()));
}

#[test]
fn test_send_text_empty() {
    let server = MockServer::start();
    let client = connect(&server);

    let response = client.send_text("   ");
    assert!(response.is_error());
    assert_eq!(server.accepted(), 1);
}

#[test]
fn test_sequential_sends_keep_order() {
    let server = MockServer::start();
    let client = connect(&server);

    for i in 0..200 {
        let response = client.send(&Command::new("ECHO").arg(i.to_string()));
        assert_eq!(response, Response::Str(i.to_string()));
    }
}

#[test]
fn test_concurrent_sends_do_not_interleave() {
    let server = MockServer::start();
    let client = Arc::new(connect(&server));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for i in 0..50 {
                    let text = format!("{}-{}", t, i);
                    let response = client.send(&Command::new("ECHO").arg(text.clone()));
                    assert_eq!(response, Response::Str(text));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_server_error_not_retried() {
    let server = MockServer::start();
    let client = connect(&server);

    let response = client.send(&Command::new("BOGUS"));
    assert_eq!(response.error_message(), Some("unknown command 'BOGUS'"));
    assert_eq!(server.accepted(), 1);
    assert_eq!(client.generation(), 0);
}

// =============================================================================
// Reconnection Tests
// =============================================================================

#[test]
fn test_reconnect_after_server_closes_socket() {
    let server = MockServer::start();
    let client = connect(&server);
    assert_eq!(client.send_text("PING"), Response::Str("PONG".into()));

    server.kill_connections();

    assert_eq!(client.send_text("PING"), Response::Str("PONG".into()));
    assert_eq!(client.generation(), 1);
    assert_eq!(server.accepted(), 2);

    // Identity survives reconnection
    let handshakes = server.handshakes();
    assert_eq!(handshakes.len(), 2);
    assert_eq!(handshakes[0], handshakes[1]);
    assert_eq!(handshakes[1].0, client.id());
}

#[test]
fn test_retry_happens_once() {
    let server = MockServer::start();
    let client = connect(&server);

    // The server hangs up on DROP every time: one reconnect, one retry, then give up
    let response = client.send_text("DROP");
    assert!(response.is_error());
    assert_eq!(server.accepted(), 2);
    assert_eq!(client.generation(), 1);
    assert!(!client.is_broken());

    assert_eq!(client.send_text("PING"), Response::Str("PONG".into()));
}

#[test]
fn test_idle_timeout_is_recoverable() {
    let server = MockServer::start();
    let config = Config::builder().connect_timeout_ms(1000).idle_timeout_ms(100).build();
    let client = Client::connect("127.0.0.1", server.port(), config).unwrap();

    let response = client.send_text("HANG");
    assert!(response.is_error());
    assert_eq!(server.accepted(), 2);

    assert_eq!(client.send_text("PING"), Response::Str("PONG".into()));
}

#[test]
fn test_server_down_breaks_client() {
    let mut server = MockServer::start();
    let client = connect(&server);

    server.stop();
    server.kill_connections();

    let response = client.send_text("PING");
    assert!(response.is_error());
    assert!(client.is_broken());
    assert_eq!(server.accepted(), 1);

    // Broken: fail fast, never dial again
    let response = client.send_text("PING");
    assert!(response.error_message().unwrap().contains("broken"));
    assert_eq!(server.accepted(), 1);
}

#[test]
fn test_concurrent_reconnect_same_failure() {
    let server = MockServer::start();
    let client = Arc::new(connect(&server));
    server.kill_connections();

    let observed = client.generation();
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let client = Arc::clone(&client);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                client.reconnect(observed).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<Recovery> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(outcomes.iter().filter(|r| **r == Recovery::Reconnected).count(), 1);
    assert_eq!(outcomes.iter().filter(|r| **r == Recovery::AlreadyRecovered).count(), 1);
    assert_eq!(server.accepted(), 2);
    assert_eq!(client.send_text("PING"), Response::Str("PONG".into()));
}

#[test]
fn test_oversized_response_does_not_desync_commands() {
    let server = MockServer::start();
    let config = Config::builder().connect_timeout_ms(1000).max_message_size(128).build();
    let client = Client::connect("127.0.0.1", server.port(), config).unwrap();

    let response = client.send_text("BIG 300");
    assert!(response.error_message().unwrap().contains("message too large"));
    assert_eq!(server.accepted(), 1);

    // The next command gets its own reply, never the leftover payload
    assert_eq!(client.send_text("ECHO SECOND"), Response::Str("SECOND".into()));
    assert_eq!(client.send_text("ECHO THIRD"), Response::Str("THIRD".into()));
    assert_eq!(server.accepted(), 2);
    assert!(!client.is_broken());
}

// =============================================================================
// Close Tests
// =============================================================================

#[test]
fn test_close_is_idempotent() {
    let server = MockServer::start();
    let client = connect(&server);

    client.close();
    client.close();

    assert!(client.is_closed());
    assert_eq!(client.send_text("PING"), Response::error("connection closed"));
    assert_eq!(server.accepted(), 1);
}

#[test]
fn test_watch_after_close() {
    let server = MockServer::start();
    let client = connect(&server);
    client.close();

    assert!(matches!(client.watch(), Err(ClientError::Closed)));
}

#[test]
fn test_close_interrupts_in_flight_send() {
    let server = MockServer::start();
    let client = Arc::new(connect(&server));

    let (response_tx, response_rx) = channel::bounded(1);
    let sender = Arc::clone(&client);
    thread::spawn(move || {
        let _ = response_tx.send(sender.send_text("HANG"));
    });
    thread::sleep(Duration::from_millis(100));

    let (closed_tx, closed_rx) = channel::bounded(1);
    let closer = Arc::clone(&client);
    thread::spawn(move || {
        closer.close();
        let _ = closed_tx.send(());
    });

    assert!(closed_rx.recv_timeout(Duration::from_secs(2)).is_ok());
    let response = response_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(response.is_error());
    assert!(client.is_closed());

    // Closing must not trigger a reconnection
    assert_eq!(server.accepted(), 1);
}
