//! Requests sent from the controller to the device.

use bytes::BufMut;

use crate::error::{ProtocolError, ProtocolResult};
use crate::frame::encode_frame;
use crate::payload::{put_count, put_value, PayloadReader};
use crate::types::{Command, Frame, ParamValue, SchemaIndex};

/// Requests that can be sent to a device.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Liveness probe.
    Ping,

    /// Ask for the parameter schema.
    GetSchema,

    /// Ask for every parameter value.
    ReadAll,

    /// Ask for a single parameter value.
    ReadValue {
        /// Parameter id.
        id: u8,
    },

    /// Write one parameter.
    WriteValue {
        /// Parameter id.
        id: u8,
        /// New value; text for string parameters, number otherwise.
        value: ParamValue,
    },

    /// Write every numeric parameter, in schema order.
    WriteAll {
        /// One value per non-string parameter.
        values: Vec<f32>,
    },
}

impl Request {
    /// Command byte for this request.
    pub fn command(&self) -> Command {
        match self {
            Request::Ping => Command::Ping,
            Request::GetSchema => Command::GetSchema,
            Request::ReadAll => Command::ReadAll,
            Request::ReadValue { .. } => Command::ReadValue,
            Request::WriteValue { .. } => Command::WriteValue,
            Request::WriteAll { .. } => Command::WriteAll,
        }
    }

    /// Encode the payload only.
    pub fn payload(&self) -> ProtocolResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            Request::Ping | Request::GetSchema | Request::ReadAll => {}

            Request::ReadValue { id } => buf.put_u8(*id),

            Request::WriteValue { id, value } => {
                buf.put_u8(*id);
                put_value(&mut buf, value)?;
            }

            Request::WriteAll { values } => {
                put_count(&mut buf, values.len())?;
                for v in values {
                    buf.put_f32_le(*v);
                }
            }
        }
        Ok(buf)
    }

    /// Encode as a complete wire frame.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        encode_frame(self.command(), &self.payload()?)
    }

    /// Decode a request received by a device.
    ///
    /// `schema` resolves whether a written value is text or a number; writing
    /// an id the schema does not contain yields
    /// [`ProtocolError::UnknownParameter`].
    pub fn decode(frame: &Frame, schema: &SchemaIndex) -> ProtocolResult<Self> {
        let mut r = PayloadReader::new(&frame.payload);
        match frame.command {
            Command::Ping => Ok(Request::Ping),
            Command::GetSchema => Ok(Request::GetSchema),
            Command::ReadAll => Ok(Request::ReadAll),
            Command::ReadValue => Ok(Request::ReadValue { id: r.read_u8()? }),

            Command::WriteValue => {
                let id = r.read_u8()?;
                let param_type = schema.get(id).ok_or(ProtocolError::UnknownParameter(id))?;
                let value = r.read_value(param_type)?;
                Ok(Request::WriteValue { id, value })
            }

            Command::WriteAll => {
                let count = r.read_u8()? as usize;
                let values = (0..count)
                    .map(|_| r.read_f32_le())
                    .collect::<ProtocolResult<Vec<_>>>()?;
                Ok(Request::WriteAll { values })
            }

            other => Err(ProtocolError::UnexpectedCommand(other)),
        }
    }
}
