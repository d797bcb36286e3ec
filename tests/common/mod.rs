//! Shared test helpers
//!
//! An in-process server speaking the kvwire protocol, with hooks to kill
//! connections, stop accepting and push to watch sessions.

#![allow(dead_code)]

use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use kvwire::protocol::{read_command, write_response, Response, HANDSHAKE, MAX_MESSAGE_SIZE};
use kvwire::Config;

// =============================================================================
// Helper Functions
// =============================================================================

/// Config with short timeouts for tests
pub fn test_config() -> Config {
    Config::builder().connect_timeout_ms(1000).build()
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

/// A port nothing is listening on
pub fn unused_port() -> i32 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port() as i32
}

/// Accept one connection and hand it to `handler` on a background thread
pub fn spawn_raw_server<F>(handler: F) -> (i32, JoinHandle<()>)
where
    F: FnOnce(TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port() as i32;
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        handler(stream);
    });
    (port, handle)
}

// =============================================================================
// Mock Server
// =============================================================================

#[derive(Default)]
struct ServerState {
    accepted: AtomicUsize,
    stopped: AtomicBool,
    reject_handshake: Mutex<Option<String>>,
    handshakes: Mutex<Vec<(String, String)>>,
    /// Handshaken connections: (mode, stream)
    connections: Mutex<Vec<(String, TcpStream)>>,
}

/// Minimal server understanding:
/// - `HANDSHAKE id mode` → Nil (or the configured rejection)
/// - `PING` → "PONG"
/// - `ECHO args..` → args joined by spaces
/// - `PUSH args..` → pushes each arg to every watch session, replies with the count
/// - `BIG n` → replies with `n` zero bytes
/// - `DROP` → closes the connection without replying
/// - `HANG` → never replies
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    accept_thread: Option<JoinHandle<()>>,
}

impl MockServer {
    pub fn start() -> Self {
        Self::start_with(None)
    }

    /// A server that rejects every handshake with `message`
    pub fn rejecting(message: &str) -> Self {
        Self::start_with(Some(message.to_string()))
    }

    fn start_with(reject: Option<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(ServerState::default());
        *state.reject_handshake.lock().unwrap() = reject;

        let accept_state = Arc::clone(&state);
        let accept_thread = thread::spawn(move || {
            for stream in listener.incoming() {
                if accept_state.stopped.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(stream) = stream else { continue };
                accept_state.accepted.fetch_add(1, Ordering::SeqCst);
                let conn_state = Arc::clone(&accept_state);
                thread::spawn(move || handle_connection(stream, conn_state));
            }
        });

        Self {
            addr,
            state,
            accept_thread: Some(accept_thread),
        }
    }

    pub fn port(&self) -> i32 {
        self.addr.port() as i32
    }

    /// Connections accepted so far
    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    /// Completed handshakes as (identity, mode)
    pub fn handshakes(&self) -> Vec<(String, String)> {
        self.state.handshakes.lock().unwrap().clone()
    }

    pub fn handshake_count(&self, mode: &str) -> usize {
        self.handshakes().iter().filter(|(_, m)| m == mode).count()
    }

    /// Shut down every open connection
    pub fn kill_connections(&self) {
        self.kill_where(|_| true);
    }

    pub fn kill_command_connections(&self) {
        self.kill_where(|mode| mode == "command");
    }

    pub fn kill_watch_connections(&self) {
        self.kill_where(|mode| mode == "watch");
    }

    fn kill_where(&self, pred: impl Fn(&str) -> bool) {
        let mut connections = self.state.connections.lock().unwrap();
        connections.retain(|(mode, stream)| {
            if pred(mode) {
                let _ = stream.shutdown(Shutdown::Both);
                false
            } else {
                true
            }
        });
    }

    /// Push a response to every watch session
    pub fn push(&self, response: &Response) -> usize {
        push_to_watchers(&self.state, response)
    }

    /// Stop accepting; new dials are refused afterwards
    pub fn stop(&mut self) {
        if self.state.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        // Wake the accept loop so it drops the listener
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.accept_thread.take() {
            handle.join().unwrap();
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.stop();
        self.kill_connections();
    }
}

fn push_to_watchers(state: &ServerState, response: &Response) -> usize {
    let connections = state.connections.lock().unwrap();
    let mut delivered = 0;
    for (mode, stream) in connections.iter() {
        let mut writer = stream;
        if mode == "watch" && write_response(&mut writer, response, MAX_MESSAGE_SIZE).is_ok() {
            delivered += 1;
        }
    }
    delivered
}

fn handle_connection(stream: TcpStream, state: Arc<ServerState>) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = stream.try_clone().unwrap();

    loop {
        let command = match read_command(&mut reader, MAX_MESSAGE_SIZE) {
            Ok(command) => command,
            Err(_) => return,
        };

        let response = match command.cmd.as_str() {
            HANDSHAKE => {
                if let Some(message) = state.reject_handshake.lock().unwrap().clone() {
                    let _ = write_response(&mut writer, &Response::error(message), MAX_MESSAGE_SIZE);
                    let _ = stream.shutdown(Shutdown::Both);
                    return;
                }
                let identity = command.args.first().cloned().unwrap_or_default();
                let mode = command.args.get(1).cloned().unwrap_or_default();

                // Holding the connection list keeps pushes from racing the reply,
                // and the handshake is visible before the client sees the reply
                let mut connections = state.connections.lock().unwrap();
                state.handshakes.lock().unwrap().push((identity, mode.clone()));
                if write_response(&mut writer, &Response::Nil, MAX_MESSAGE_SIZE).is_err() {
                    return;
                }
                connections.push((mode, stream.try_clone().unwrap()));
                continue;
            }
            "PING" => Response::Str("PONG".to_string()),
            "ECHO" => Response::Str(command.args.join(" ")),
            "PUSH" => {
                for arg in &command.args {
                    push_to_watchers(&state, &Response::Str(arg.clone()));
                }
                Response::Int(command.args.len() as i64)
            }
            "BIG" => {
                let size = command.args.first().and_then(|n| n.parse().ok()).unwrap_or(0);
                Response::Bytes(vec![0u8; size])
            }
            "DROP" => {
                let _ = stream.shutdown(Shutdown::Both);
                return;
            }
            "HANG" => continue,
            other => Response::error(format!("unknown command '{}'", other)),
        };

        if write_response(&mut writer, &response, MAX_MESSAGE_SIZE).is_err() {
            return;
        }
    }
}
