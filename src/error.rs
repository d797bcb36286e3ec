//! Error types for kvwire
//!
//! Provides a unified error type for all client operations.

use thiserror::Error;

/// Result type alias using ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

/// Unified error type for kvwire operations
#[derive(Debug, Error)]
pub enum ClientError {
    // -------------------------------------------------------------------------
    // Connection Setup Errors
    // -------------------------------------------------------------------------
    #[error("connect to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    #[error("could not complete the handshake: {0}")]
    Handshake(String),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("EOF")]
    EndOfStream,

    #[error("connection was torn down by an earlier failure")]
    Disconnected,

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("failed to decode message: {0}")]
    Decode(String),

    #[error("failed to encode message: {0}")]
    Encode(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("reconnect failed: {0}")]
    Reconnect(String),

    #[error("client is broken after a failed reconnect: {0}")]
    Broken(String),

    #[error("watch stream terminated: {0}")]
    WatchTerminated(String),

    #[error("connection closed")]
    Closed,
}
