//! Response definitions
//!
//! Represents responses received from the server.

use serde::{Deserialize, Serialize};

/// A response from the server.
///
/// Exactly one variant is populated. `Error` means the operation failed and
/// carries the failure text, whether it came from the server or from the
/// transport underneath the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Str(String),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Nil,
    Error(String),
}

impl Response {
    /// Create an ERROR response
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(message.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    /// The error text, if this response is a failure
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Response::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Response::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Response::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Response::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Response::Bytes(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Response::Nil)
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Response::Str(value) => write!(f, "{}", value),
            Response::Int(value) => write!(f, "{}", value),
            Response::Float(value) => write!(f, "{}", value),
            Response::Bytes(value) => write!(f, "{}", String::from_utf8_lossy(value)),
            Response::Nil => f.write_str("(nil)"),
            Response::Error(message) => write!(f, "ERR {}", message),
        }
    }
}
