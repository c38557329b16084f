//! Payload field readers and writers.
//!
//! Multi-byte values are little-endian. Strings and lists carry a 1-byte
//! length preamble, so writers refuse anything longer than 255.

use bytes::BufMut;

use crate::constants::*;
use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{ParamType, ParamValue};

/// Cursor over a received payload.
#[derive(Debug, Clone)]
pub struct PayloadReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    /// Start reading at the beginning of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        PayloadReader { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether everything has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> ProtocolResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(ProtocolError::too_short(self.pos + n, self.data.len()));
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> ProtocolResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a little-endian f32.
    pub fn read_f32_le(&mut self) -> ProtocolResult<f32> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_str(&mut self) -> ProtocolResult<String> {
        let len = self.read_u8()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Read a value encoded for a parameter of `param_type`.
    pub fn read_value(&mut self, param_type: ParamType) -> ProtocolResult<ParamValue> {
        if param_type.is_text() {
            Ok(ParamValue::Text(self.read_str()?))
        } else {
            Ok(ParamValue::Number(self.read_f32_le()?))
        }
    }

    /// Consume and return everything left.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }
}

/// Append a length-prefixed string.
pub fn put_str(buf: &mut Vec<u8>, s: &str) -> ProtocolResult<()> {
    let bytes = s.as_bytes();
    if bytes.len() > MAX_STRING_LEN {
        return Err(ProtocolError::StringTooLong {
            max: MAX_STRING_LEN,
            actual: bytes.len(),
        });
    }
    buf.put_u8(bytes.len() as u8);
    buf.put_slice(bytes);
    Ok(())
}

/// Append a list count preamble.
pub fn put_count(buf: &mut Vec<u8>, count: usize) -> ProtocolResult<()> {
    if count > MAX_LIST_ENTRIES {
        return Err(ProtocolError::TooManyEntries {
            max: MAX_LIST_ENTRIES,
            actual: count,
        });
    }
    buf.put_u8(count as u8);
    Ok(())
}

/// Append a value: f32 for numbers, length-prefixed text for strings.
pub fn put_value(buf: &mut Vec<u8>, value: &ParamValue) -> ProtocolResult<()> {
    match value {
        ParamValue::Number(v) => {
            buf.put_f32_le(*v);
            Ok(())
        }
        ParamValue::Text(s) => put_str(buf, s),
    }
}
