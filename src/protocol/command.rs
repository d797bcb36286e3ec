//! Command definitions
//!
//! Represents commands sent to the server.

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Reserved command name used to open a session
pub const HANDSHAKE: &str = "HANDSHAKE";

/// The role a session plays on its connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionMode {
    /// Request/response command traffic
    Command,

    /// Server-initiated push notifications only
    Watch,
}

impl SessionMode {
    /// Wire representation sent during the handshake
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Command => "command",
            SessionMode::Watch => "watch",
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named operation plus its ordered string arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Command name (e.g. `PING`, `GET`)
    pub cmd: String,

    /// Arguments, in order
    pub args: Vec<String>,
}

impl Command {
    /// Create a command with no arguments
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The handshake command for a session identity and mode
    pub fn handshake(identity: &str, mode: SessionMode) -> Self {
        Self::new(HANDSHAKE).arg(identity).arg(mode.as_str())
    }

    /// Parse a whitespace separated command line.
    ///
    /// The first token is the command name, the rest are passed through
    /// verbatim as arguments. Quoting is not supported.
    pub fn parse(text: &str) -> Result<Self> {
        let mut tokens = text.split_whitespace();
        let cmd = tokens
            .next()
            .ok_or_else(|| ClientError::InvalidCommand("empty command".to_string()))?;

        Ok(Self::new(cmd).args(tokens))
    }

    pub fn is_handshake(&self) -> bool {
        self.cmd == HANDSHAKE
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.cmd)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
