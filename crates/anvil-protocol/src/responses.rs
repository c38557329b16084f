//! Responses and notifications sent from the device to the controller.

use bytes::BufMut;

use crate::error::{ProtocolError, ProtocolResult};
use crate::frame::encode_frame;
use crate::payload::{put_count, put_str, put_value, PayloadReader};
use crate::types::*;

/// Frames a device sends back.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Answer to a ping. Older firmware sends an empty payload.
    Pong {
        /// Acknowledgment byte, when present.
        ack: Option<u8>,
    },

    /// Parameter schema. Values are initialized to each parameter's minimum.
    Schema(Vec<DeviceParameter>),

    /// Every parameter value, answering ReadAll.
    Values(Vec<(u8, ParamValue)>),

    /// A single parameter value, answering ReadValue.
    Value {
        /// Parameter id.
        id: u8,
        /// Current value.
        value: ParamValue,
    },

    /// Acknowledgment of a WriteValue. [`NOT_FOUND_ID`](crate::NOT_FOUND_ID) means the id was unknown.
    WriteAck {
        /// Parameter id that was written.
        id: u8,
    },

    /// Device-originated log line.
    Log {
        /// Severity.
        level: LogLevel,
        /// Message text.
        message: String,
    },
}

impl Response {
    /// Command byte for this response.
    pub fn command(&self) -> Command {
        match self {
            Response::Pong { .. } => Command::Ping,
            Response::Schema(_) => Command::GetSchema,
            Response::Values(_) => Command::ReadAll,
            Response::Value { .. } => Command::ReadValue,
            Response::WriteAck { .. } => Command::WriteValue,
            Response::Log { .. } => Command::Log,
        }
    }

    /// Encode the payload only.
    pub fn payload(&self) -> ProtocolResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            Response::Pong { ack } => {
                if let Some(ack) = ack {
                    buf.put_u8(*ack);
                }
            }

            Response::Schema(params) => {
                put_count(&mut buf, params.len())?;
                for p in params {
                    buf.put_u8(p.id);
                    buf.put_u8(p.param_type.into());
                    put_str(&mut buf, &p.name)?;
                    buf.put_f32_le(p.min);
                    buf.put_f32_le(p.max);
                }
            }

            Response::Values(values) => {
                put_count(&mut buf, values.len())?;
                for (id, value) in values {
                    buf.put_u8(*id);
                    put_value(&mut buf, value)?;
                }
            }

            Response::Value { id, value } => {
                buf.put_u8(*id);
                put_value(&mut buf, value)?;
            }

            Response::WriteAck { id } => buf.put_u8(*id),

            Response::Log { level, message } => {
                buf.put_u8((*level).into());
                buf.put_slice(message.as_bytes());
            }
        }
        Ok(buf)
    }

    /// Encode as a complete wire frame.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        encode_frame(self.command(), &self.payload()?)
    }

    /// Decode a frame received by the controller.
    ///
    /// `schema` holds the types from the last schema response; value frames
    /// cannot be decoded without it.
    pub fn decode(frame: &Frame, schema: &SchemaIndex) -> ProtocolResult<Self> {
        let mut r = PayloadReader::new(&frame.payload);
        match frame.command {
            Command::Ping => {
                let ack = if r.is_empty() { None } else { Some(r.read_u8()?) };
                Ok(Response::Pong { ack })
            }

            Command::GetSchema => decode_schema(&mut r).map(Response::Schema),

            Command::ReadAll => {
                let count = r.read_u8()? as usize;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(decode_entry(&mut r, schema)?);
                }
                Ok(Response::Values(values))
            }

            Command::ReadValue => {
                let (id, value) = decode_entry(&mut r, schema)?;
                Ok(Response::Value { id, value })
            }

            Command::WriteValue => Ok(Response::WriteAck { id: r.read_u8()? }),

            Command::Log => {
                let level = LogLevel::from(r.read_u8()?);
                let message = String::from_utf8_lossy(r.read_rest()).into_owned();
                Ok(Response::Log { level, message })
            }

            other => Err(ProtocolError::UnexpectedCommand(other)),
        }
    }
}

// ============================================================================
// Helper decode functions
// ============================================================================

fn decode_schema(r: &mut PayloadReader<'_>) -> ProtocolResult<Vec<DeviceParameter>> {
    let count = r.read_u8()? as usize;
    let mut params = Vec::with_capacity(count);
    for _ in 0..count {
        let id = r.read_u8()?;
        let param_type = ParamType::try_from(r.read_u8()?)?;
        let name = r.read_str()?;
        let min = r.read_f32_le()?;
        let max = r.read_f32_le()?;

        params.push(DeviceParameter::numeric(id, param_type, name, min, min, max));
    }
    Ok(params)
}

fn decode_entry(r: &mut PayloadReader<'_>, schema: &SchemaIndex) -> ProtocolResult<(u8, ParamValue)> {
    let id = r.read_u8()?;
    let param_type = schema.get(id).ok_or(ProtocolError::UnknownParameter(id))?;
    Ok((id, r.read_value(param_type)?))
}
