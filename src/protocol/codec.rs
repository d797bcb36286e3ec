//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! Every message travels as one length-prefixed frame:
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Len (4)  │      Payload (bincode)      │
//! └──────────┴─────────────────────────────┘
//! ```
//!
//! The length is a big-endian `u32` counting payload bytes only. Earlier
//! servers delimited messages by socket read boundaries; that framing is not
//! supported.

use std::io::{self, Read, Write};

use bytes::{Bytes, BytesMut};

use crate::error::{ClientError, Result};
use super::{Command, Response};

/// Frame header size: 4 bytes payload length
pub const FRAME_HEADER_SIZE: usize = 4;

/// Default maximum payload size (32 MB)
pub const MAX_MESSAGE_SIZE: usize = 32 * 1024 * 1024;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
pub fn encode_command(command: &Command) -> Result<Vec<u8>> {
    bincode::serialize(command).map_err(|e| ClientError::Encode(e.to_string()))
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    bincode::deserialize(bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    bincode::serialize(response).map_err(|e| ClientError::Encode(e.to_string()))
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    bincode::deserialize(bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

// =============================================================================
// Stream-based framing helpers
// =============================================================================

/// Write one frame (length header + payload) and flush
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8], max_size: usize) -> Result<()> {
    if payload.len() > max_size || payload.len() > u32::MAX as usize {
        return Err(ClientError::MessageTooLarge {
            size: payload.len(),
            max: max_size,
        });
    }

    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one complete frame payload.
///
/// Blocks until the whole payload is available. A clean end-of-stream before
/// the first header byte yields `EndOfStream`; an oversized length is rejected
/// before any payload byte is read.
pub fn read_frame<R: Read>(reader: &mut R, max_size: usize) -> Result<Bytes> {
    let header = read_header(reader)?.ok_or(ClientError::EndOfStream)?;
    let payload_len = u32::from_be_bytes(header) as usize;

    if payload_len > max_size {
        return Err(ClientError::MessageTooLarge {
            size: payload_len,
            max: max_size,
        });
    }

    let mut payload = BytesMut::zeroed(payload_len);
    if payload_len > 0 {
        reader.read_exact(&mut payload)?;
    }

    Ok(payload.freeze())
}

/// Read the length header, `None` on a clean end-of-stream
fn read_header<R: Read>(reader: &mut R) -> Result<Option<[u8; FRAME_HEADER_SIZE]>> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let mut filled = 0;

    while filled < FRAME_HEADER_SIZE {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Some(header))
}

/// Write a command as one frame
pub fn write_command<W: Write>(writer: &mut W, command: &Command, max_size: usize) -> Result<()> {
    let bytes = encode_command(command)?;
    write_frame(writer, &bytes, max_size)
}

/// Read one framed command
pub fn read_command<R: Read>(reader: &mut R, max_size: usize) -> Result<Command> {
    let payload = read_frame(reader, max_size)?;
    decode_command(&payload)
}

/// Write a response as one frame
pub fn write_response<W: Write>(writer: &mut W, response: &Response, max_size: usize) -> Result<()> {
    let bytes = encode_response(response)?;
    write_frame(writer, &bytes, max_size)
}

/// Read one framed response
pub fn read_response<R: Read>(reader: &mut R, max_size: usize) -> Result<Response> {
    let payload = read_frame(reader, max_size)?;
    decode_response(&payload)
}
