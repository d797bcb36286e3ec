//! Reconnection Policy
//!
//! Decides which failures are worth a fresh connection and performs the
//! single-shot recovery for a client.
//!
//! ## Concurrency
//! - The reconnection lock is owned by one `Reconnector`, i.e. one client.
//!   Unrelated clients never wait on each other.
//! - Lock order is always reconnection lock → slot lock → slot closer.
//! - Closing a slot shuts its socket through the closer before taking the
//!   slot lock, so a blocked round trip cannot hold up `close`.
//! - The slot generation detects a failure that was already recovered by
//!   another caller, so one failure yields at most one new session.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::protocol::SessionMode;

use super::channel::{ChannelCloser, Endpoint};
use super::session::Session;

// =============================================================================
// Failure Classification
// =============================================================================

/// Whether a failure is eligible for reconnection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The peer closed or reset the connection, or it sat idle too long
    Recoverable,

    /// Anything else: bad data, oversized message, rejected handshake, ...
    Fatal,
}

/// Classify a typed failure
pub fn classify(error: &ClientError) -> FailureClass {
    match error {
        ClientError::EndOfStream | ClientError::Disconnected => FailureClass::Recoverable,
        ClientError::Io(e) => match e.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            // Idle timeout (Windows reports TimedOut instead of WouldBlock)
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut => FailureClass::Recoverable,
            _ => FailureClass::Fatal,
        },
        _ => FailureClass::Fatal,
    }
}

/// Classify a failure that only survives as text.
///
/// `Client::send` folds transport failures into `Response::Error`, so a
/// caller that decides whether to retry an outer operation only has the
/// message. This applies the same rules as `classify` to that text.
pub fn classify_text(text: &str) -> FailureClass {
    let text = text.to_ascii_lowercase();
    let recoverable = text == "eof"
        || text.ends_with(": eof")
        || text.contains("broken pipe")
        || text.contains("connection reset")
        || text.contains("connection aborted")
        || text.contains("torn down by an earlier failure");

    if recoverable {
        FailureClass::Recoverable
    } else {
        FailureClass::Fatal
    }
}

// =============================================================================
// Session Slot
// =============================================================================

/// Lifecycle of a slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Connected,

    /// A reconnection failed; terminal
    Broken(String),

    /// Closed by the owner; terminal
    Closed,
}

struct SlotInner {
    session: Option<Session>,
    generation: u64,
    state: SlotState,
}

/// Lock-guarded indirection to the active session of one mode.
///
/// Every access to the session goes through the slot, so a reconnection
/// swaps the session for all holders at once.
pub struct SessionSlot {
    inner: Mutex<SlotInner>,

    /// Shuts the active session's socket without waiting for the slot lock
    closer: Mutex<Option<ChannelCloser>>,

    /// Set as soon as `close` starts
    closing: AtomicBool,

    mode: SessionMode,
}

impl SessionSlot {
    pub fn new(session: Session) -> Self {
        let mode = session.mode();
        let closer = session.closer().ok();
        Self {
            inner: Mutex::new(SlotInner {
                session: Some(session),
                generation: 0,
                state: SlotState::Connected,
            }),
            closer: Mutex::new(closer),
            closing: AtomicBool::new(false),
            mode,
        }
    }

    /// Run `op` against the active session.
    ///
    /// Returns the generation the operation ran against alongside its result,
    /// so a failure can be reported to `Reconnector::recover`. Broken and
    /// closed slots fail immediately without touching the network. A session
    /// whose channel was torn down by an earlier failure reports
    /// `Disconnected`, which is eligible for recovery.
    pub fn with_session<T>(&self, op: impl FnOnce(&mut Session) -> Result<T>) -> (u64, Result<T>) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let generation = inner.generation;

        if self.closing.load(Ordering::SeqCst) {
            return (generation, Err(ClientError::Closed));
        }

        let result = match (&inner.state, inner.session.as_mut()) {
            (SlotState::Broken(reason), _) => Err(ClientError::Broken(reason.clone())),
            (SlotState::Closed, _) | (_, None) => Err(ClientError::Closed),
            (SlotState::Connected, Some(session)) if session.is_closed() => {
                Err(ClientError::Disconnected)
            }
            (SlotState::Connected, Some(session)) => op(session),
        };
        (generation, result)
    }

    /// Close the session; returns false if the slot was already closed.
    ///
    /// An in-flight round trip is interrupted and fails on its own thread.
    pub fn close(&self) -> bool {
        if self.closing.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Some(closer) = self.closer.lock().take() {
            closer.close();
        }

        let mut inner = self.inner.lock();
        inner.state = SlotState::Closed;
        if let Some(mut session) = inner.session.take() {
            session.close();
        }
        true
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    pub fn state(&self) -> SlotState {
        if self.closing.load(Ordering::SeqCst) {
            return SlotState::Closed;
        }
        self.inner.lock().state.clone()
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }
}

// =============================================================================
// Reconnector
// =============================================================================

/// Outcome of a recovery request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// This call opened the replacement session
    Reconnected,

    /// Another caller already replaced the failed session
    AlreadyRecovered,
}

/// Reopens sessions for one client with its original endpoint and identity
pub struct Reconnector {
    endpoint: Endpoint,
    identity: String,
    config: Config,

    /// Serializes reconnections of this client across command and watch paths
    lock: Mutex<()>,
}

impl Reconnector {
    pub fn new(endpoint: Endpoint, identity: impl Into<String>, config: Config) -> Self {
        Self {
            endpoint,
            identity: identity.into(),
            config,
            lock: Mutex::new(()),
        }
    }

    /// Open a fresh session without taking the reconnection lock
    pub fn open(&self, mode: SessionMode) -> Result<Session> {
        Session::open(&self.endpoint, &self.identity, mode, &self.config)
    }

    /// Open a replacement session under the reconnection lock
    pub fn reopen(&self, mode: SessionMode) -> Result<Session> {
        let _guard = self.lock.lock();
        tracing::warn!("Connection lost, reconnecting {} session to {}", mode, self.endpoint);

        self.open(mode).map_err(|e| {
            tracing::error!("Failed to reconnect {} session: {}", mode, e);
            ClientError::Reconnect(e.to_string())
        })
    }

    /// Replace the slot's session after a failure observed at `observed_generation`.
    ///
    /// Exactly one attempt is made. On failure the slot is left `Broken`.
    pub fn recover(&self, slot: &SessionSlot, observed_generation: u64) -> Result<Recovery> {
        let _guard = self.lock.lock();
        let mut inner = slot.inner.lock();

        if slot.closing.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }

        match &inner.state {
            SlotState::Closed => return Err(ClientError::Closed),
            SlotState::Broken(reason) => return Err(ClientError::Broken(reason.clone())),
            SlotState::Connected => {}
        }

        if inner.generation != observed_generation {
            tracing::debug!(
                "{} session already recovered (generation {} -> {})",
                slot.mode,
                observed_generation,
                inner.generation
            );
            return Ok(Recovery::AlreadyRecovered);
        }

        tracing::warn!("Connection lost, reconnecting {} session to {}", slot.mode, self.endpoint);

        match self.open(slot.mode) {
            Ok(session) => {
                *slot.closer.lock() = session.closer().ok();
                if let Some(mut old) = inner.session.replace(session) {
                    old.close();
                }
                inner.generation += 1;
                tracing::info!(
                    "Reconnected {} session {} (generation {})",
                    slot.mode,
                    self.identity,
                    inner.generation
                );
                Ok(Recovery::Reconnected)
            }
            Err(e) => {
                tracing::error!("Failed to reconnect {} session: {}", slot.mode, e);
                inner.state = SlotState::Broken(e.to_string());
                if let Some(mut old) = inner.session.take() {
                    old.close();
                }
                Err(ClientError::Reconnect(e.to_string()))
            }
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
