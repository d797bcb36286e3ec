//! Network Module
//!
//! TCP transport for the client.
//!
//! ## Layers
//! - `FramedChannel`: one socket, whole messages in and out
//! - `Session`: a channel after a successful handshake
//! - `Reconnector` / `SessionSlot`: single-shot recovery of a failed session
//! - `WatchStream`: background reader for server pushes

mod channel;
mod session;
mod reconnect;
mod watch;

pub use channel::{ChannelCloser, Endpoint, FramedChannel};
pub use session::Session;
pub use reconnect::{classify, classify_text, FailureClass, Reconnector, Recovery, SessionSlot, SlotState};
pub use watch::{WatchQueue, WatchStream};
