//! Session
//!
//! A handshaken conversation over one framed channel.

use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::protocol::{decode_response, encode_command, Command, Response, SessionMode};

use super::channel::{ChannelCloser, Endpoint, FramedChannel};

/// One session: a channel plus the identity and mode it was opened with
pub struct Session {
    channel: FramedChannel,
    identity: String,
    mode: SessionMode,
}

impl Session {
    /// Dial the endpoint and perform the handshake.
    ///
    /// Any failure during the handshake closes the channel before returning.
    pub fn open(endpoint: &Endpoint, identity: &str, mode: SessionMode, config: &Config) -> Result<Self> {
        let channel = FramedChannel::open(endpoint, config)?;
        Self::handshake(channel, identity, mode)
    }

    /// Perform the handshake on an already open channel
    pub fn handshake(channel: FramedChannel, identity: &str, mode: SessionMode) -> Result<Self> {
        let mut session = Self {
            channel,
            identity: identity.to_string(),
            mode,
        };

        let outcome = match session.round_trip(&Command::handshake(identity, mode)) {
            Ok(Response::Error(message)) if !message.is_empty() => Err(message),
            Ok(_) => session.settle_mode().map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(()) => {
                tracing::debug!(
                    "Session {} ({}) established with {}",
                    session.identity,
                    mode,
                    session.channel.peer_addr()
                );
                Ok(session)
            }
            Err(message) => {
                session.close();
                Err(ClientError::Handshake(message))
            }
        }
    }

    /// Watch sessions wait for pushes indefinitely; only writes keep the
    /// idle timeout.
    fn settle_mode(&self) -> Result<()> {
        match self.mode {
            SessionMode::Watch => self.channel.set_read_timeout(None),
            SessionMode::Command => Ok(()),
        }
    }

    /// Send one command and read exactly one response
    pub fn round_trip(&mut self, command: &Command) -> Result<Response> {
        let bytes = encode_command(command)?;
        self.channel.send(&bytes)?;
        self.receive()
    }

    /// Send one command, folding any transport failure into an error response
    pub fn send(&mut self, command: &Command) -> Response {
        self.round_trip(command)
            .unwrap_or_else(|e| Response::error(e.to_string()))
    }

    /// Read one unsolicited response (watch sessions)
    pub fn receive(&mut self) -> Result<Response> {
        let payload = self.channel.receive()?;
        decode_response(&payload)
    }

    pub fn closer(&self) -> Result<ChannelCloser> {
        self.channel.closer()
    }

    pub fn close(&mut self) {
        self.channel.close();
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn peer_addr(&self) -> &str {
        self.channel.peer_addr()
    }
}
