//! Common types used in the protocol.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ProtocolError;

/// Command byte of a frame.
///
/// Unknown codes are preserved so a well-formed frame is never dropped just
/// because this side does not understand it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Liveness probe.
    Ping,
    /// Parameter schema.
    GetSchema,
    /// Single parameter value.
    ReadValue,
    /// All parameter values.
    ReadAll,
    /// Single parameter write / acknowledgment.
    WriteValue,
    /// Positional write of every numeric parameter.
    WriteAll,
    /// Device log line.
    Log,
    /// Any other code.
    Unknown(u8),
}

impl Command {
    /// Every known command.
    pub const ALL: [Command; 7] = [
        Command::Ping,
        Command::GetSchema,
        Command::ReadValue,
        Command::ReadAll,
        Command::WriteValue,
        Command::WriteAll,
        Command::Log,
    ];

    /// Wire code.
    pub fn code(self) -> u8 {
        self.into()
    }

    /// Short name used in logs and metric labels.
    pub fn name(self) -> &'static str {
        match self {
            Command::Ping => "Ping",
            Command::GetSchema => "GetSchema",
            Command::ReadValue => "ReadValue",
            Command::ReadAll => "ReadAll",
            Command::WriteValue => "WriteValue",
            Command::WriteAll => "WriteAll",
            Command::Log => "Log",
            Command::Unknown(_) => "Unknown",
        }
    }
}

impl From<u8> for Command {
    fn from(code: u8) -> Self {
        match code {
            CMD_PING => Command::Ping,
            CMD_GET_SCHEMA => Command::GetSchema,
            CMD_READ_VALUE => Command::ReadValue,
            CMD_READ_ALL => Command::ReadAll,
            CMD_WRITE_VALUE => Command::WriteValue,
            CMD_WRITE_ALL => Command::WriteAll,
            CMD_LOG => Command::Log,
            other => Command::Unknown(other),
        }
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> Self {
        match command {
            Command::Ping => CMD_PING,
            Command::GetSchema => CMD_GET_SCHEMA,
            Command::ReadValue => CMD_READ_VALUE,
            Command::ReadAll => CMD_READ_ALL,
            Command::WriteValue => CMD_WRITE_VALUE,
            Command::WriteAll => CMD_WRITE_ALL,
            Command::Log => CMD_LOG,
            Command::Unknown(code) => code,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Unknown(code) => write!(f, "Unknown(0x{:02X})", code),
            known => f.write_str(known.name()),
        }
    }
}

/// Kind of a device parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// On/off, stored as 0.0 / 1.0.
    Toggle,
    /// Continuous value within [min, max].
    Slider,
    /// Integer value within [min, max].
    Numeric,
    /// Free text.
    String,
}

impl ParamType {
    /// Whether values of this type travel as text.
    pub fn is_text(self) -> bool {
        matches!(self, ParamType::String)
    }
}

impl TryFrom<u8> for ParamType {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            PARAM_TYPE_TOGGLE => Ok(ParamType::Toggle),
            PARAM_TYPE_SLIDER => Ok(ParamType::Slider),
            PARAM_TYPE_NUMERIC => Ok(ParamType::Numeric),
            PARAM_TYPE_STRING => Ok(ParamType::String),
            other => Err(ProtocolError::UnknownParamType(other)),
        }
    }
}

impl From<ParamType> for u8 {
    fn from(param_type: ParamType) -> Self {
        match param_type {
            ParamType::Toggle => PARAM_TYPE_TOGGLE,
            ParamType::Slider => PARAM_TYPE_SLIDER,
            ParamType::Numeric => PARAM_TYPE_NUMERIC,
            ParamType::String => PARAM_TYPE_STRING,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamType::Toggle => "toggle",
            ParamType::Slider => "slider",
            ParamType::Numeric => "numeric",
            ParamType::String => "string",
        };
        f.write_str(s)
    }
}

/// A decoded parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Value of a toggle, slider or numeric parameter.
    Number(f32),
    /// Value of a string parameter.
    Text(String),
}

impl ParamValue {
    /// The numeric value, if any.
    pub fn as_number(&self) -> Option<f32> {
        match self {
            ParamValue::Number(v) => Some(*v),
            ParamValue::Text(_) => None,
        }
    }

    /// The text value, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Number(_) => None,
            ParamValue::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(v) => write!(f, "{}", v),
            ParamValue::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// A configurable parameter exposed by a device.
///
/// The wire fields come from the schema and value frames. `pending`,
/// `last_sent_value`, `last_sent_string` and `edit_mode` are controller-side
/// session state and never travel on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceParameter {
    /// Identity, unique within a device session.
    pub id: u8,
    /// Parameter kind.
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Display name.
    pub name: String,
    /// Current numeric value (unused for strings).
    #[serde(default)]
    pub value: f32,
    /// Lower bound (unused for strings).
    #[serde(default)]
    pub min: f32,
    /// Upper bound (unused for strings).
    #[serde(default)]
    pub max: f32,
    /// Current text value (strings only).
    #[serde(default)]
    pub string_value: String,

    /// A write is in flight and not yet acknowledged.
    #[serde(skip)]
    pub pending: bool,
    /// Last numeric value transmitted or confirmed.
    #[serde(skip)]
    pub last_sent_value: f32,
    /// Last text value transmitted or confirmed.
    #[serde(skip)]
    pub last_sent_string: String,
    /// The operator is editing this parameter.
    #[serde(skip)]
    pub edit_mode: bool,
}

impl DeviceParameter {
    /// Create a numeric-typed parameter (toggle, slider or numeric).
    pub fn numeric(id: u8, param_type: ParamType, name: impl Into<String>, value: f32, min: f32, max: f32) -> Self {
        DeviceParameter {
            id,
            param_type,
            name: name.into(),
            value,
            min,
            max,
            string_value: String::new(),
            pending: false,
            last_sent_value: value,
            last_sent_string: String::new(),
            edit_mode: false,
        }
    }

    /// Create a string parameter.
    pub fn text(id: u8, name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        DeviceParameter {
            id,
            param_type: ParamType::String,
            name: name.into(),
            value: 0.0,
            min: 0.0,
            max: 0.0,
            last_sent_string: value.clone(),
            string_value: value,
            pending: false,
            last_sent_value: 0.0,
            edit_mode: false,
        }
    }

    /// Current value as a [`ParamValue`] matching the parameter type.
    pub fn current_value(&self) -> ParamValue {
        if self.param_type.is_text() {
            ParamValue::Text(self.string_value.clone())
        } else {
            ParamValue::Number(self.value)
        }
    }

    /// Store a value, checking it matches the parameter type.
    pub fn apply_value(&mut self, value: &ParamValue) -> Result<(), ProtocolError> {
        match (self.param_type.is_text(), value) {
            (true, ParamValue::Text(s)) => {
                self.string_value.clone_from(s);
                Ok(())
            }
            (false, ParamValue::Number(v)) => {
                self.value = *v;
                Ok(())
            }
            _ => Err(ProtocolError::ValueTypeMismatch {
                id: self.id,
                param_type: self.param_type,
            }),
        }
    }
}

/// Severity of a device log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Informational.
    Info,
    /// Warning.
    Warning,
    /// Error (any code >= 2).
    Error,
}

impl From<u8> for LogLevel {
    fn from(code: u8) -> Self {
        match code {
            LOG_LEVEL_INFO => LogLevel::Info,
            LOG_LEVEL_WARNING => LogLevel::Warning,
            _ => LogLevel::Error,
        }
    }
}

impl From<LogLevel> for u8 {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Info => LOG_LEVEL_INFO,
            LogLevel::Warning => LOG_LEVEL_WARNING,
            LogLevel::Error => LOG_LEVEL_ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// One decoded frame: command plus checksum-verified payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command byte.
    pub command: Command,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame.
    pub fn new(command: Command, payload: impl Into<Vec<u8>>) -> Self {
        Frame {
            command,
            payload: payload.into(),
        }
    }
}

/// Parameter types by id, in schema order.
///
/// Value frames do not carry types, so decoding them needs the schema that
/// preceded them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaIndex {
    order: Vec<u8>,
    types: HashMap<u8, ParamType>,
}

impl SchemaIndex {
    /// Build from a parameter list.
    pub fn from_parameters(params: &[DeviceParameter]) -> Self {
        let mut index = SchemaIndex::default();
        for p in params {
            if index.types.insert(p.id, p.param_type).is_none() {
                index.order.push(p.id);
            }
        }
        index
    }

    /// Type of the parameter with this id.
    pub fn get(&self, id: u8) -> Option<ParamType> {
        self.types.get(&id).copied()
    }

    /// Ids in schema order.
    pub fn ids(&self) -> &[u8] {
        &self.order
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no schema has been seen.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
