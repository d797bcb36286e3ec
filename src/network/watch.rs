//! Watch Stream
//!
//! Owns the dedicated watch session and republishes every pushed response
//! onto an unbounded queue.
//!
//! ## Delivery
//! - Responses are queued in the order the server sent them, each once.
//! - When the watch connection drops, one reconnection is attempted. Messages
//!   the server sent before the drop but that never arrived are lost; there is
//!   no replay.
//! - A fatal failure or a failed reconnection ends the stream. The queue then
//!   closes and reports the recorded reason to its consumers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::error::{ClientError, Result};
use crate::protocol::{Response, SessionMode};

use super::channel::ChannelCloser;
use super::reconnect::{classify, FailureClass, Reconnector};
use super::session::Session;

/// State shared by the read loop and every queue handle
struct WatchShared {
    /// Set once the owner closes the stream
    closed: AtomicBool,

    /// Shuts the socket the read loop is currently blocked on
    closer: Mutex<Option<ChannelCloser>>,

    /// Why the read loop stopped, if it stopped on its own
    terminal_error: Mutex<Option<String>>,
}

impl WatchShared {
    fn terminate(&self, reason: String) {
        tracing::error!("Watch stream terminated: {}", reason);
        *self.terminal_error.lock() = Some(reason);
    }
}

/// Consumer handle to the watch queue.
///
/// Clones share one underlying queue; each response is delivered to exactly
/// one receiver.
#[derive(Clone)]
pub struct WatchQueue {
    receiver: Receiver<Response>,
    shared: Arc<WatchShared>,
}

impl WatchQueue {
    /// Block until the next response arrives.
    ///
    /// Once the stream has ended and the queue is drained, fails with
    /// `Closed` after an explicit close and `WatchTerminated` otherwise.
    pub fn recv(&self) -> Result<Response> {
        self.receiver.recv().map_err(|_| self.ended())
    }

    /// Take the next response if one is queued
    pub fn try_recv(&self) -> Result<Option<Response>> {
        match self.receiver.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.ended()),
        }
    }

    /// Wait up to `timeout` for the next response
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Response>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(response) => Ok(Some(response)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(self.ended()),
        }
    }

    /// Iterate responses until the stream ends.
    ///
    /// Check `terminal_error` afterwards to tell a failure from a close.
    pub fn iter(&self) -> impl Iterator<Item = Response> + '_ {
        self.receiver.iter()
    }

    /// Number of responses waiting to be consumed
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// The failure that ended the stream, if any
    pub fn terminal_error(&self) -> Option<String> {
        self.shared.terminal_error.lock().clone()
    }

    fn ended(&self) -> ClientError {
        if self.shared.closed.load(Ordering::SeqCst) {
            return ClientError::Closed;
        }
        let reason = self
            .terminal_error()
            .unwrap_or_else(|| "watch connection lost".to_string());
        ClientError::WatchTerminated(reason)
    }
}

/// The background watch subscription of one client
pub struct WatchStream {
    queue: WatchQueue,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WatchStream {
    /// Open a watch-mode session and start the read loop
    pub fn subscribe(reconnector: Arc<Reconnector>) -> Result<Self> {
        let session = reconnector.open(SessionMode::Watch)?;
        let (sender, receiver) = channel::unbounded();

        let shared = Arc::new(WatchShared {
            closed: AtomicBool::new(false),
            closer: Mutex::new(Some(session.closer()?)),
            terminal_error: Mutex::new(None),
        });

        let loop_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("kvwire-watch-{}", reconnector.identity()))
            .spawn(move || run_watch_loop(session, sender, reconnector, loop_shared))?;

        Ok(Self {
            queue: WatchQueue { receiver, shared },
            handle: Mutex::new(Some(handle)),
        })
    }

    /// A handle to the queue; every call returns the same queue
    pub fn queue(&self) -> WatchQueue {
        self.queue.clone()
    }

    /// Stop the read loop and close the watch session. Idempotent.
    pub fn close(&self) {
        let shared = &self.queue.shared;
        shared.closed.store(true, Ordering::SeqCst);
        if let Some(closer) = shared.closer.lock().as_ref() {
            closer.close();
        }

        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                tracing::error!("Watch thread panicked");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.queue.shared.closed.load(Ordering::SeqCst)
    }
}

/// Read pushed responses until the stream is closed or fails for good
fn run_watch_loop(
    mut session: Session,
    sender: Sender<Response>,
    reconnector: Arc<Reconnector>,
    shared: Arc<WatchShared>,
) {
    tracing::debug!("Watch loop started for session {}", session.identity());

    loop {
        let error = match session.receive() {
            Ok(response) => {
                tracing::trace!("Watch push: {:?}", response);
                if sender.send(response).is_err() {
                    // Every queue handle is gone
                    break;
                }
                continue;
            }
            Err(e) => e,
        };

        if shared.closed.load(Ordering::SeqCst) {
            tracing::debug!("Watch loop stopping: stream closed");
            break;
        }

        if classify(&error) == FailureClass::Fatal {
            shared.terminate(error.to_string());
            break;
        }

        session.close();
        let replacement = match reconnector.reopen(SessionMode::Watch) {
            Ok(replacement) => replacement,
            Err(e) => {
                shared.terminate(format!("{} ({})", error, e));
                break;
            }
        };
        session = replacement;

        let mut closer = shared.closer.lock();
        if shared.closed.load(Ordering::SeqCst) {
            break;
        }
        match session.closer() {
            Ok(c) => *closer = Some(c),
            Err(e) => {
                drop(closer);
                shared.terminate(e.to_string());
                break;
            }
        }
    }

    session.close();
    tracing::debug!("Watch loop exited");
}
