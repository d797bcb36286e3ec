//! Client Module
//!
//! The object an application holds: command issuance plus the watch
//! subscription, with transparent single-shot reconnection.
//!
//! ## State Machine (command path)
//! ```text
//!   Connected ──(transport failure)──▶ Reconnecting ──(ok)──▶ Connected
//!                                           │
//!                                           └──(failed)──▶ Broken (terminal)
//! ```
//!
//! A broken client answers every `send` with an error response without
//! touching the network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::network::{
    classify, Endpoint, FailureClass, Reconnector, Recovery, SessionSlot, SlotState, WatchQueue,
    WatchStream,
};
use crate::protocol::{Command, Response, SessionMode};

/// A connected client
///
/// ## Concurrency
/// - `send` may be called from many threads; round trips on the command
///   connection are serialized by the session slot (no pipelining).
/// - The watch read loop runs on its own thread and connection.
/// - Reconnections of this client are serialized by its `Reconnector`.
pub struct Client {
    /// Session identity, stable across reconnections
    id: String,

    /// Endpoint, identity and config used for every (re)dial
    reconnector: Arc<Reconnector>,

    /// The active command session
    command: SessionSlot,

    /// Watch subscription, created on first `watch()`
    watch: Mutex<Option<WatchStream>>,

    closed: AtomicBool,
}

impl Client {
    /// Connect to `host:port` and perform the command-mode handshake
    pub fn connect(host: impl Into<String>, port: i32, config: Config) -> Result<Self> {
        let endpoint = Endpoint::new(host, port)?;
        let id = config
            .session_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let reconnector = Arc::new(Reconnector::new(endpoint, id.clone(), config));
        let session = reconnector.open(SessionMode::Command)?;

        tracing::info!("Client {} connected to {}", id, reconnector.endpoint());

        Ok(Self {
            id,
            reconnector,
            command: SessionSlot::new(session),
            watch: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Connect with the default configuration
    pub fn connect_default(host: impl Into<String>, port: i32) -> Result<Self> {
        Self::connect(host, port, Config::default())
    }

    /// Issue one command.
    ///
    /// Failures never propagate as `Err`: they come back as
    /// `Response::Error`. A dropped or reset connection is reconnected once
    /// and the command retried once on the new session.
    pub fn send(&self, command: &Command) -> Response {
        let (generation, result) = self.command.with_session(|session| session.round_trip(command));
        let error = match result {
            Ok(response) => return response,
            Err(e) => e,
        };

        if classify(&error) == FailureClass::Fatal {
            return Response::error(error.to_string());
        }

        tracing::warn!("Command {} failed: {}", command.cmd, error);

        match self.reconnector.recover(&self.command, generation) {
            Ok(_) => {
                let (_, retry) = self.command.with_session(|session| session.round_trip(command));
                retry.unwrap_or_else(|e| Response::error(e.to_string()))
            }
            Err(_) => Response::error(error.to_string()),
        }
    }

    /// Parse a whitespace separated command line and send it
    pub fn send_text(&self, text: &str) -> Response {
        match Command::parse(text) {
            Ok(command) => self.send(&command),
            Err(e) => Response::error(e.to_string()),
        }
    }

    /// Subscribe to server pushes.
    ///
    /// The first call opens the watch session; later calls return the same
    /// queue.
    ///
    /// The watch connection recovers independently of the command path. If
    /// its reconnection fails, only the watch stream ends: the queue reports
    /// `WatchTerminated` while `send` keeps working and `is_broken` stays
    /// false. Messages in flight when the watch connection drops are lost.
    pub fn watch(&self) -> Result<WatchQueue> {
        let mut watch = self.watch.lock();
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }

        if let Some(stream) = watch.as_ref() {
            return Ok(stream.queue());
        }

        let stream = WatchStream::subscribe(Arc::clone(&self.reconnector))?;
        let queue = stream.queue();
        *watch = Some(stream);
        Ok(queue)
    }

    /// Replace the command session after a failure seen at `observed_generation`.
    ///
    /// Concurrent calls for the same generation open exactly one new session.
    pub fn reconnect(&self, observed_generation: u64) -> Result<Recovery> {
        self.reconnector.recover(&self.command, observed_generation)
    }

    /// Generation of the active command session, bumped on each reconnection
    pub fn generation(&self) -> u64 {
        self.command.generation()
    }

    /// Close the command and watch sessions. Idempotent.
    ///
    /// Does not wait for an in-flight `send`: its socket is shut down and that
    /// call returns an error response.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.command.close();
        if let Some(stream) = self.watch.lock().as_ref() {
            stream.close();
        }
        tracing::debug!("Client {} closed", self.id);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the session identity
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the server endpoint
    pub fn endpoint(&self) -> &Endpoint {
        self.reconnector.endpoint()
    }

    /// True once a reconnection has failed
    pub fn is_broken(&self) -> bool {
        matches!(self.command.state(), SlotState::Broken(_))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}
