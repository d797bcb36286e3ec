//! # kvwire
//!
//! Client transport for a request/response key-value protocol:
//! - Length-prefixed binary messages over a persistent TCP connection
//! - Session handshake carrying a stable client identity
//! - Single-shot transparent reconnection on dropped connections
//! - Server push ("watch") delivered on a dedicated connection
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Client                               │
//! │              send / send_text / watch / close                │
//! └───────────────┬─────────────────────────────┬───────────────┘
//!                 │                             │
//!   ┌─────────────▼─────────────┐   ┌───────────▼───────────────┐
//!   │   SessionSlot (command)   │   │  WatchStream (own thread) │
//!   │      + Reconnector        │   │  → unbounded WatchQueue   │
//!   └─────────────┬─────────────┘   └───────────┬───────────────┘
//!                 │                             │
//!          ┌──────▼──────┐               ┌──────▼──────┐
//!          │   Session   │               │   Session   │
//!          │  (command)  │               │   (watch)   │
//!          └──────┬──────┘               └──────┬──────┘
//!                 │                             │
//!          ┌──────▼──────┐               ┌──────▼──────┐
//!          │FramedChannel│               │FramedChannel│
//!          └─────────────┘               └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ClientError, Result};
pub use config::Config;
pub use client::Client;
pub use protocol::{Command, Response};
pub use network::WatchQueue;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvwire
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
