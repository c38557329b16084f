//! Protocol engine: owns a transport, frames outgoing requests and turns
//! incoming bytes into events.

use anvil_common::Transport;
use anvil_metrics::{metric_defs, LinkLabels};
use log::{debug, error, info, trace, warn};

use crate::commands::Request;
use crate::constants::*;
use crate::error::{ProtocolError, ProtocolResult};
use crate::frame::{encode_frame, CodecStats, FrameCodec};
use crate::responses::Response;
use crate::types::*;

/// Which end of the link the engine drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineRole {
    /// Controller: interprets device responses.
    #[default]
    Master,
    /// Device: reports every received command uninterpreted.
    Slave,
}

impl EngineRole {
    /// Lowercase name for logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            EngineRole::Master => "master",
            EngineRole::Slave => "slave",
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Link role.
    pub role: EngineRole,
    /// Maximum bytes pulled from the transport per tick.
    pub read_chunk: usize,
    /// Port name used to label metrics.
    pub port: String,
    /// Emit [`EngineEvent::CommandReceived`] for every frame before the
    /// master interprets it. Always on for the slave role.
    pub observe_commands: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            role: EngineRole::Master,
            read_chunk: DEFAULT_READ_CHUNK,
            port: String::new(),
            observe_commands: false,
        }
    }
}

/// Something that happened on the link during a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A frame arrived (slave role, or a master with `observe_commands`).
    CommandReceived {
        /// Command byte.
        command: Command,
        /// Raw payload.
        payload: Vec<u8>,
    },
    /// The device sent its parameter schema.
    SchemaReceived(Vec<DeviceParameter>),
    /// The device reported one or more parameter values.
    ValuesReceived(Vec<(u8, ParamValue)>),
    /// The device acknowledged a write.
    WriteAcknowledged(u8),
    /// The device sent a log line.
    LogReceived {
        /// Severity.
        level: LogLevel,
        /// Message text.
        message: String,
    },
    /// The device answered a ping.
    PingAcknowledged,
    /// A complete frame failed its checksum and was dropped.
    FrameRejected {
        /// Command byte of the dropped frame.
        command: Command,
    },
}

/// Traffic counters for one engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Frames written.
    pub frames_sent: u64,
    /// Bytes written.
    pub bytes_sent: u64,
    /// Bytes read.
    pub bytes_received: u64,
    /// Well-formed frames whose payload could not be interpreted.
    pub malformed_frames: u64,
}

/// Drives one link.
///
/// The engine owns its transport for its whole life and hands it back through
/// [`ProtocolEngine::into_transport`]. Nothing blocks: sends write one frame and
/// return, [`ProtocolEngine::tick`] reads whatever is available.
pub struct ProtocolEngine<T: Transport> {
    transport: T,
    codec: FrameCodec,
    schema: SchemaIndex,
    config: EngineConfig,
    stats: EngineStats,
    labels: Vec<(&'static str, String)>,
}

impl<T: Transport> ProtocolEngine<T> {
    /// Create a master-role engine with default settings.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, EngineConfig::default())
    }

    /// Create an engine with explicit settings.
    pub fn with_config(transport: T, config: EngineConfig) -> Self {
        let labels = LinkLabels::new(config.port.clone(), config.role.as_str()).to_labels();
        ProtocolEngine {
            transport,
            codec: FrameCodec::new(),
            schema: SchemaIndex::default(),
            config,
            stats: EngineStats::default(),
            labels,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The link role.
    pub fn role(&self) -> EngineRole {
        self.config.role
    }

    /// Whether the underlying transport is open.
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Tear the engine down and return the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Types from the last schema seen.
    pub fn schema(&self) -> &SchemaIndex {
        &self.schema
    }

    /// Replace the schema used to decode value frames.
    pub fn set_schema(&mut self, params: &[DeviceParameter]) {
        self.schema = SchemaIndex::from_parameters(params);
    }

    /// Traffic counters.
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Framing counters.
    pub fn codec_stats(&self) -> CodecStats {
        self.codec.stats()
    }

    // ========================================================================
    // Receive
    // ========================================================================

    /// Pull available bytes and decode every complete frame.
    pub fn tick(&mut self) -> Vec<EngineEvent> {
        if !self.transport.is_open() {
            return Vec::new();
        }

        let data = self.transport.read(self.config.read_chunk);
        if !data.is_empty() {
            self.stats.bytes_received += data.len() as u64;
            metrics::counter!(metric_defs::ENGINE_BYTES_RECEIVED.name, &self.labels)
                .increment(data.len() as u64);
            trace!("Engine[{}]: read {} bytes", self.config.port, data.len());
            self.codec.push(&data);
        }

        let mut events = Vec::new();
        for outcome in self.codec.decode_all() {
            match outcome {
                Ok(frame) => self.dispatch(frame, &mut events),
                Err(ProtocolError::ChecksumMismatch { command, .. }) => {
                    events.push(EngineEvent::FrameRejected { command });
                }
                Err(e) => error!("Engine[{}]: decode failed: {}", self.config.port, e),
            }
        }
        events
    }

    fn dispatch(&mut self, frame: Frame, events: &mut Vec<EngineEvent>) {
        if self.config.role == EngineRole::Slave {
            events.push(EngineEvent::CommandReceived {
                command: frame.command,
                payload: frame.payload,
            });
            return;
        }
        if self.config.observe_commands {
            events.push(EngineEvent::CommandReceived {
                command: frame.command,
                payload: frame.payload.clone(),
            });
        }

        let response = match Response::decode(&frame, &self.schema) {
            Ok(response) => response,
            Err(e) => {
                self.stats.malformed_frames += 1;
                warn!(
                    "Engine[{}]: dropping {} frame ({} bytes): {}",
                    self.config.port,
                    frame.command,
                    frame.payload.len(),
                    e
                );
                return;
            }
        };

        match response {
            Response::Pong { ack } => {
                info!("Engine[{}]: ping acknowledged ({:?})", self.config.port, ack);
                events.push(EngineEvent::PingAcknowledged);
            }
            Response::Schema(params) => {
                debug!(
                    "Engine[{}]: schema with {} parameters",
                    self.config.port,
                    params.len()
                );
                self.schema = SchemaIndex::from_parameters(&params);
                events.push(EngineEvent::SchemaReceived(params));
            }
            Response::Values(values) => events.push(EngineEvent::ValuesReceived(values)),
            Response::Value { id, value } => {
                events.push(EngineEvent::ValuesReceived(vec![(id, value)]))
            }
            Response::WriteAck { id } => events.push(EngineEvent::WriteAcknowledged(id)),
            Response::Log { level, message } => {
                events.push(EngineEvent::LogReceived { level, message })
            }
        }
    }

    // ========================================================================
    // Send
    // ========================================================================

    /// Frame and write a raw command and payload.
    pub fn send_packet(&mut self, command: Command, payload: &[u8]) -> ProtocolResult<()> {
        if !self.transport.is_open() {
            return Err(ProtocolError::LinkClosed);
        }
        let bytes = encode_frame(command, payload)?;
        let written = self.transport.write(&bytes)?;
        if written < bytes.len() {
            warn!(
                "Engine[{}]: {} frame truncated, link took {} of {} bytes",
                self.config.port,
                command,
                written,
                bytes.len()
            );
            return Err(ProtocolError::ShortWrite {
                expected: bytes.len(),
                actual: written,
            });
        }

        self.stats.frames_sent += 1;
        self.stats.bytes_sent += written as u64;
        metrics::counter!(metric_defs::ENGINE_FRAMES_SENT.name, &self.labels).increment(1);
        metrics::counter!(metric_defs::ENGINE_BYTES_SENT.name, &self.labels)
            .increment(written as u64);
        trace!(
            "Engine[{}]: sent {} ({} bytes)",
            self.config.port,
            command,
            written
        );
        Ok(())
    }

    /// Send a typed request.
    pub fn send_request(&mut self, request: &Request) -> ProtocolResult<()> {
        self.send_packet(request.command(), &request.payload()?)
    }

    /// Send a typed response (slave role).
    pub fn send_response(&mut self, response: &Response) -> ProtocolResult<()> {
        self.send_packet(response.command(), &response.payload()?)
    }

    /// Send a ping.
    pub fn send_ping(&mut self) -> ProtocolResult<()> {
        self.send_request(&Request::Ping)
    }

    /// Ask the device for its schema.
    pub fn request_schema(&mut self) -> ProtocolResult<()> {
        self.send_request(&Request::GetSchema)
    }

    /// Ask the device for every value.
    pub fn request_all_values(&mut self) -> ProtocolResult<()> {
        self.send_request(&Request::ReadAll)
    }

    /// Ask the device for one value.
    pub fn read_value(&mut self, id: u8) -> ProtocolResult<()> {
        self.send_request(&Request::ReadValue { id })
    }

    /// Write a numeric value.
    pub fn write_value(&mut self, id: u8, value: f32) -> ProtocolResult<()> {
        self.send_request(&Request::WriteValue {
            id,
            value: ParamValue::Number(value),
        })
    }

    /// Write a string value.
    pub fn write_string(&mut self, id: u8, value: &str) -> ProtocolResult<()> {
        self.send_request(&Request::WriteValue {
            id,
            value: ParamValue::Text(value.to_string()),
        })
    }

    /// Write every numeric parameter positionally.
    pub fn write_all(&mut self, values: &[f32]) -> ProtocolResult<()> {
        self.send_request(&Request::WriteAll {
            values: values.to_vec(),
        })
    }
}
