//! Protocol error types.

use anvil_common::TransportError;
use thiserror::Error;

use crate::types::{Command, ParamType};

/// Errors that can occur when framing, decoding or sending protocol messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Payload ended before a field could be read.
    #[error("payload too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Bytes needed.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Payload does not fit the 16-bit length field.
    #[error("payload too large: maximum {max} bytes, got {actual}")]
    PayloadTooLarge {
        /// Maximum payload size.
        max: usize,
        /// Attempted payload size.
        actual: usize,
    },

    /// List does not fit a 1-byte count preamble.
    #[error("too many entries: maximum {max}, got {actual}")]
    TooManyEntries {
        /// Maximum entry count.
        max: usize,
        /// Attempted entry count.
        actual: usize,
    },

    /// String does not fit a 1-byte length preamble.
    #[error("string too long: maximum {max} bytes, got {actual}")]
    StringTooLong {
        /// Maximum length.
        max: usize,
        /// Attempted length.
        actual: usize,
    },

    /// Trailing checksum did not match the payload.
    #[error("checksum mismatch for command {command}: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch {
        /// Command of the discarded frame.
        command: Command,
        /// XOR of the received payload.
        expected: u8,
        /// Checksum byte on the wire.
        actual: u8,
    },

    /// Unknown parameter type code in a schema entry.
    #[error("unknown parameter type: 0x{0:02X}")]
    UnknownParamType(u8),

    /// Parameter id not present in the schema.
    #[error("unknown parameter id: {0}")]
    UnknownParameter(u8),

    /// Value kind does not match the parameter type.
    #[error("parameter {id} is {param_type}, value does not match")]
    ValueTypeMismatch {
        /// Parameter id.
        id: u8,
        /// Declared type.
        param_type: ParamType,
    },

    /// Frame carries a command that is not valid in this direction.
    #[error("unexpected command: {0}")]
    UnexpectedCommand(Command),

    /// String field is not valid UTF-8.
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    /// The link accepted only part of a frame.
    #[error("short write: frame is {expected} bytes, link took {actual}")]
    ShortWrite {
        /// Encoded frame length.
        expected: usize,
        /// Bytes the link accepted.
        actual: usize,
    },

    /// The link is closed.
    #[error("link is closed")]
    LinkClosed,

    /// Transport failure while sending.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ProtocolError {
    /// Shorthand for [`ProtocolError::FrameTooShort`].
    pub fn too_short(expected: usize, actual: usize) -> Self {
        ProtocolError::FrameTooShort { expected, actual }
    }
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
