//! Framed Channel
//!
//! Owns one TCP connection and moves whole messages across it.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::Bytes;

use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::protocol::{read_frame, write_frame};

/// Server address, fixed for the lifetime of a client and reused on redial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Validate a host/port pair.
    ///
    /// Ports outside 1..=65535 fail with `Connect` before any dial is attempted.
    pub fn new(host: impl Into<String>, port: i32) -> Result<Self> {
        let host = host.into();
        match u16::try_from(port) {
            Ok(port) if port != 0 => Ok(Self { host, port }),
            _ => Err(ClientError::Connect {
                addr: format!("{}:{}", host, port),
                reason: format!("invalid port {}", port),
            }),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn resolve(&self) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| self.connect_error(e))?
            .collect();

        if addrs.is_empty() {
            return Err(self.connect_error("no addresses resolved"));
        }
        Ok(addrs)
    }

    fn connect_error(&self, reason: impl ToString) -> ClientError {
        ClientError::Connect {
            addr: self.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One framed TCP connection.
///
/// Exactly one logical operation may use a channel at a time: a send/receive
/// pair or a continuous read loop.
pub struct FramedChannel {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Peer address for logging
    peer_addr: String,

    /// Largest payload accepted in either direction
    max_message_size: usize,

    closed: bool,
}

impl FramedChannel {
    /// Dial the endpoint and set up buffered I/O and timeouts
    pub fn open(endpoint: &Endpoint, config: &Config) -> Result<Self> {
        let mut last_error = None;

        for addr in endpoint.resolve()? {
            match TcpStream::connect_timeout(&addr, config.connect_timeout()) {
                Ok(stream) => return Self::from_stream(stream, config),
                Err(e) => {
                    tracing::debug!("Dial {} ({}) failed: {}", endpoint, addr, e);
                    last_error = Some(e);
                }
            }
        }

        Err(endpoint.connect_error(
            last_error.map_or_else(|| "no addresses resolved".to_string(), |e| e.to_string()),
        ))
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: TcpStream, config: &Config) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;
        stream.set_read_timeout(config.idle_timeout())?;
        stream.set_write_timeout(config.idle_timeout())?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        tracing::debug!("Connection established to {}", peer_addr);

        Ok(Self {
            reader: BufReader::with_capacity(config.io_buffer_size, read_stream),
            writer: BufWriter::with_capacity(config.io_buffer_size, write_stream),
            peer_addr,
            max_message_size: config.max_message_size,
            closed: false,
        })
    }

    /// Write one complete message.
    ///
    /// A failure after the first byte may leave a partial frame on the wire,
    /// so the channel is closed. An oversized payload is refused before any
    /// write and leaves the channel usable.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        tracing::trace!("Sending {} bytes to {}", payload.len(), self.peer_addr);

        match write_frame(&mut self.writer, payload, self.max_message_size) {
            Ok(()) => Ok(()),
            Err(e @ ClientError::MessageTooLarge { .. }) => Err(e),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Block until one complete message has arrived.
    ///
    /// Any failure closes the channel: the stream position is no longer at a
    /// frame boundary (e.g. an oversized payload was left unread).
    pub fn receive(&mut self) -> Result<Bytes> {
        if self.closed {
            return Err(ClientError::Closed);
        }

        match read_frame(&mut self.reader, self.max_message_size) {
            Ok(payload) => {
                tracing::trace!("Received {} bytes from {}", payload.len(), self.peer_addr);
                Ok(payload)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Close after a failure that desynchronized the stream
    fn fail(&mut self, error: ClientError) -> ClientError {
        tracing::debug!("Closing connection to {} after failure: {}", self.peer_addr, error);
        self.close();
        error
    }

    /// Replace the read timeout; `None` blocks indefinitely
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    /// Handle that can shut this connection down from another thread
    pub fn closer(&self) -> Result<ChannelCloser> {
        Ok(ChannelCloser {
            stream: self.writer.get_ref().try_clone()?,
        })
    }

    /// Release the socket. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        // The peer may already be gone
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
        tracing::debug!("Connection to {} closed", self.peer_addr);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

impl Drop for FramedChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Shuts a channel's socket down without owning the channel.
///
/// A blocked `receive` on the owning thread returns once the socket is shut.
#[derive(Debug)]
pub struct ChannelCloser {
    stream: TcpStream,
}

impl ChannelCloser {
    pub fn close(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
