//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Messages
//! - `Command`: command name plus ordered string arguments
//! - `Response`: one of string, integer, float, bytes, nil or error text
//!
//! ## Handshake
//! The first message on every connection is `HANDSHAKE <identity> <mode>`,
//! where mode is `command` or `watch`. An error response rejects the session.
//!
//! ## Framing
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Len (4)  │         Payload             │
//! └──────────┴─────────────────────────────┘
//! ```

mod command;
mod response;
mod codec;

pub use command::{Command, SessionMode, HANDSHAKE};
pub use response::Response;
pub use codec::{
    encode_command, decode_command, encode_response, decode_response,
    read_frame, write_frame, read_command, write_command, read_response, write_response,
    FRAME_HEADER_SIZE, MAX_MESSAGE_SIZE,
};
