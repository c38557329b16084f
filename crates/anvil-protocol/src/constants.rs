//! Protocol constants
//!
//! Wire-level values shared by both ends of the link.

// ============================================================================
// Framing
// ============================================================================

/// Sentinel byte that starts every frame.
pub const START_BYTE: u8 = 0xAA;

/// Header size: start byte + command + 2-byte length.
pub const HEADER_SIZE: usize = 4;

/// Trailing checksum size.
pub const CHECKSUM_SIZE: usize = 1;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Largest list count carried by a 1-byte count preamble.
pub const MAX_LIST_ENTRIES: usize = u8::MAX as usize;

/// Longest string carried by a 1-byte length preamble.
pub const MAX_STRING_LEN: usize = u8::MAX as usize;

// ============================================================================
// Command Codes
// ============================================================================

/// Liveness probe.
pub const CMD_PING: u8 = 0x00;
/// Request / response carrying the parameter schema.
pub const CMD_GET_SCHEMA: u8 = 0x10;
/// Read a single parameter value.
pub const CMD_READ_VALUE: u8 = 0x20;
/// Read every parameter value.
pub const CMD_READ_ALL: u8 = 0x21;
/// Write a single parameter; the response is an acknowledgment.
pub const CMD_WRITE_VALUE: u8 = 0x30;
/// Write every numeric parameter positionally.
pub const CMD_WRITE_ALL: u8 = 0x31;
/// Device-originated log line.
pub const CMD_LOG: u8 = 0x40;

// ============================================================================
// Parameter Type Codes
// ============================================================================

/// On/off parameter stored as 0.0 / 1.0.
pub const PARAM_TYPE_TOGGLE: u8 = 0x01;
/// Continuous parameter within [min, max].
pub const PARAM_TYPE_SLIDER: u8 = 0x02;
/// Integer-valued parameter within [min, max].
pub const PARAM_TYPE_NUMERIC: u8 = 0x03;
/// Free text parameter.
pub const PARAM_TYPE_STRING: u8 = 0x04;

// ============================================================================
// Well-known Values
// ============================================================================

/// Payload of a ping acknowledgment from the device.
pub const PING_ACK: u8 = 0x01;

/// Id carried by a write acknowledgment when the written id does not exist.
pub const NOT_FOUND_ID: u8 = 0xFF;

/// Bytes pulled from the transport per engine tick.
pub const DEFAULT_READ_CHUNK: usize = 512;

/// Log level codes carried in [`CMD_LOG`] frames.
pub const LOG_LEVEL_INFO: u8 = 0;
/// Warning log level.
pub const LOG_LEVEL_WARNING: u8 = 1;
/// Error log level. Any code at or above this is an error.
pub const LOG_LEVEL_ERROR: u8 = 2;
