//! Controller-side session: drives the handshake and keeps the parameter table.

use anvil_common::{Clock, SimTime, SystemClock, Transport};
use anvil_metrics::metric_defs;
use anvil_protocol::{
    DeviceParameter, EngineConfig, EngineEvent, EngineRole, LogLevel, ParamType, ParamValue,
    ProtocolEngine,
};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::device_log::{DeviceLog, DeviceLogBuffer};
use crate::error::{SessionError, SessionResult};
use crate::state::{ConnectionEvent, ConnectionState, ConnectionStateMachine, Transition, TransitionAction};

/// Smallest slider movement worth sending.
pub const SLIDER_EPSILON: f32 = 0.001;

/// Clamp to a device-reported range. An inverted or non-finite range leaves
/// the value unchanged.
fn clamp_to_range(value: f32, min: f32, max: f32) -> f32 {
    if min.is_finite() && max.is_finite() && min <= max {
        value.clamp(min, max)
    } else {
        value
    }
}

/// The controller end of one device link.
///
/// Call [`Session::tick`] regularly; it advances timers, polls the link and
/// applies what the device sent. The transport lives in the session while no
/// link is up and inside the protocol engine while one is.
pub struct Session<T: Transport, C: Clock = SystemClock> {
    config: SessionConfig,
    clock: C,
    fsm: ConnectionStateMachine,

    transport: Option<T>,
    engine: Option<ProtocolEngine<T>>,

    params: Vec<DeviceParameter>,
    device_logs: DeviceLogBuffer,
    connected_port: Option<String>,
    baud_rate: u32,
    last_error: Option<String>,
    last_ping_ack: Option<SimTime>,

    welcome_started: SimTime,
    connecting_since: Option<SimTime>,
    schema_received_at: Option<SimTime>,
}

impl<T: Transport, C: Clock> Session<T, C> {
    /// Create a session in the Welcome state.
    pub fn new(transport: T, clock: C, config: SessionConfig) -> Self {
        let welcome_started = clock.now();
        Session {
            device_logs: DeviceLogBuffer::new(config.max_device_logs),
            baud_rate: config.default_baud_rate,
            config,
            clock,
            fsm: ConnectionStateMachine::new(),
            transport: Some(transport),
            engine: None,
            params: Vec::new(),
            connected_port: None,
            last_error: None,
            last_ping_ack: None,
            welcome_started,
            connecting_since: None,
            schema_received_at: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.fsm.state()
    }

    /// One-line connection status.
    pub fn status(&self) -> &'static str {
        match self.state() {
            ConnectionState::Connecting => "STATUS: Connecting...",
            ConnectionState::FetchingSchema => "STATUS: Syncing...",
            ConnectionState::Connected => "STATUS: Connected",
            ConnectionState::Welcome | ConnectionState::Disconnected => "STATUS: Disconnected",
        }
    }

    /// Placeholder text for the configuration panel; `None` once connected.
    pub fn panel_message(&self) -> Option<&'static str> {
        match self.state() {
            ConnectionState::Connected => None,
            ConnectionState::Connecting => Some("Establishing connection..."),
            ConnectionState::FetchingSchema => Some("Retrieving device configuration..."),
            ConnectionState::Welcome | ConnectionState::Disconnected => {
                Some("Please connect to a device")
            }
        }
    }

    /// Reason for the last failed or lost connection.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Parameter table, in schema order.
    pub fn parameters(&self) -> &[DeviceParameter] {
        &self.params
    }

    /// One parameter by id.
    pub fn parameter(&self, id: u8) -> Option<&DeviceParameter> {
        self.params.iter().find(|p| p.id == id)
    }

    /// Writes still waiting for an acknowledgment.
    pub fn pending_writes(&self) -> usize {
        self.params.iter().filter(|p| p.pending).count()
    }

    /// Device log, oldest first.
    pub fn device_logs(&self) -> &DeviceLogBuffer {
        &self.device_logs
    }

    /// Port of the current link.
    pub fn connected_port(&self) -> Option<&str> {
        self.connected_port.as_deref()
    }

    /// Baud rate of the current or last link.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Selectable baud rates.
    pub fn baud_rates(&self) -> &[u32] {
        &self.config.baud_rates
    }

    /// Ports the transport can discover.
    pub fn list_ports(&self) -> Vec<String> {
        match (&self.transport, &self.engine) {
            (Some(t), _) => t.list_ports(),
            (None, Some(engine)) => engine.transport().list_ports(),
            (None, None) => Vec::new(),
        }
    }

    /// When the device last answered a ping.
    pub fn last_ping_ack(&self) -> Option<SimTime> {
        self.last_ping_ack
    }

    /// The protocol engine, while a link is up.
    pub fn engine(&self) -> Option<&ProtocolEngine<T>> {
        self.engine.as_ref()
    }

    /// The transport, wherever it currently lives.
    pub fn transport_mut(&mut self) -> Option<&mut T> {
        match (&mut self.transport, &mut self.engine) {
            (Some(t), _) => Some(t),
            (None, Some(engine)) => Some(engine.transport_mut()),
            (None, None) => None,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Leave the welcome screen now.
    pub fn dismiss_welcome(&mut self) {
        self.process(ConnectionEvent::WelcomeTimer);
    }

    /// Open a link to `port`.
    ///
    /// On success the session sits in Connecting for the transition delay and
    /// then requests the schema from [`Session::tick`]. An open failure feeds
    /// ConnectionFailed straight away and is returned.
    pub fn connect(&mut self, port: &str, baud_rate: u32) -> SessionResult<()> {
        let event = ConnectionEvent::Connect {
            port: port.to_string(),
            baud_rate,
        };
        if !self.process(event).is_accepted() {
            return Err(SessionError::invalid_state(self.state(), "connect"));
        }

        let Some(transport) = self.transport.as_mut() else {
            // Transport is only absent while an engine holds it, which the state rules out
            self.process(ConnectionEvent::ConnectionFailed);
            return Err(SessionError::invalid_state(self.state(), "connect"));
        };

        match transport.open(port, baud_rate) {
            Ok(()) => {
                info!("Session: opened {} at {} baud", port, baud_rate);
                self.connected_port = Some(port.to_string());
                self.baud_rate = baud_rate;
                self.last_error = None;
                self.connecting_since = Some(self.clock.now());
                Ok(())
            }
            Err(e) => {
                error!("Session: failed to open {}: {}", port, e);
                self.last_error = Some(format!("Connection failed: {}", e));
                self.process(ConnectionEvent::ConnectionFailed);
                Err(e.into())
            }
        }
    }

    /// Close the link.
    pub fn disconnect(&mut self) -> SessionResult<()> {
        if self.process(ConnectionEvent::Disconnect).is_accepted() {
            Ok(())
        } else {
            Err(SessionError::invalid_state(self.state(), "disconnect"))
        }
    }

    /// Advance timers and apply whatever the device sent.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        let delay = SimTime::from(self.config.transition_delay());

        match self.state() {
            ConnectionState::Welcome => {
                let timeout = SimTime::from(self.config.welcome_timeout());
                if now.saturating_since(self.welcome_started) >= timeout {
                    self.process(ConnectionEvent::WelcomeTimer);
                }
                return;
            }
            ConnectionState::Connecting => {
                if self
                    .connecting_since
                    .is_some_and(|since| now.saturating_since(since) >= delay)
                {
                    self.connecting_since = None;
                    self.process(ConnectionEvent::ConnectionSuccess);
                }
            }
            _ => {}
        }

        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if !engine.is_open() {
            warn!("Session: link closed underneath the session");
            self.link_lost("link closed");
            return;
        }

        for event in engine.tick() {
            self.handle_engine_event(event);
        }

        if self.state() == ConnectionState::FetchingSchema
            && self
                .schema_received_at
                .is_some_and(|at| self.clock.now().saturating_since(at) >= delay)
        {
            self.schema_received_at = None;
            self.process(ConnectionEvent::SchemaReceived);
        }
    }

    fn process(&mut self, event: ConnectionEvent) -> Transition {
        let transition = self.fsm.process(&event);
        if let Transition::Accepted { from, to, action } = transition {
            metrics::counter!(
                metric_defs::SESSION_STATE_TRANSITIONS.name,
                "from" => from.name(),
                "to" => to.name()
            )
            .increment(1);

            if action == Some(TransitionAction::RequestSchema) {
                self.start_engine();
            }
            if to == ConnectionState::Disconnected {
                self.teardown();
            }
        }
        transition
    }

    /// Entering FetchingSchema: hand the transport to a new engine and ask for the schema.
    fn start_engine(&mut self) {
        let Some(transport) = self.transport.take() else {
            return;
        };
        let config = EngineConfig {
            role: EngineRole::Master,
            read_chunk: self.config.read_chunk,
            port: self.connected_port.clone().unwrap_or_default(),
            ..Default::default()
        };
        let mut engine = ProtocolEngine::with_config(transport, config);
        let sent = engine.request_schema();
        self.engine = Some(engine);

        if let Err(e) = sent {
            error!("Session: schema request failed: {}", e);
            self.link_lost(&e.to_string());
        }
    }

    /// The link died: abandon in-flight writes and fall back to Disconnected.
    fn link_lost(&mut self, reason: &str) {
        for p in &mut self.params {
            p.pending = false;
        }
        self.last_error = Some(format!("Connection lost: {}", reason));
        self.process(ConnectionEvent::ConnectionFailed);
    }

    /// Entering Disconnected: close the link and drop device state.
    fn teardown(&mut self) {
        if let Some(engine) = self.engine.take() {
            self.transport = Some(engine.into_transport());
        }
        if let Some(transport) = self.transport.as_mut() {
            transport.close();
        }
        self.params.clear();
        self.device_logs.clear();
        self.connected_port = None;
        self.connecting_since = None;
        self.schema_received_at = None;
        self.update_pending_gauge();
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::SchemaReceived(mut params) => {
                info!("Session: schema received ({} parameters)", params.len());
                for p in &mut params {
                    p.last_sent_value = p.value;
                    p.last_sent_string = p.string_value.clone();
                }
                self.params = params;
                self.update_pending_gauge();
                if let Some(engine) = self.engine.as_mut() {
                    if let Err(e) = engine.request_all_values() {
                        warn!("Session: value request failed: {}", e);
                    }
                }
                if self.state() == ConnectionState::FetchingSchema {
                    self.schema_received_at = Some(self.clock.now());
                }
            }

            EngineEvent::ValuesReceived(values) => {
                for (id, value) in values {
                    let Some(p) = self.params.iter_mut().find(|p| p.id == id) else {
                        debug!("Session: value for unknown parameter {}", id);
                        continue;
                    };
                    match &value {
                        ParamValue::Number(v) if !p.param_type.is_text() => {
                            p.value = *v;
                            p.last_sent_value = *v;
                        }
                        ParamValue::Text(s) if p.param_type.is_text() => {
                            p.string_value.clone_from(s);
                            p.last_sent_string.clone_from(s);
                        }
                        _ => warn!("Session: value for {} does not match its type", id),
                    }
                }
            }

            EngineEvent::WriteAcknowledged(id) => {
                match self.params.iter_mut().find(|p| p.id == id) {
                    Some(p) => p.pending = false,
                    None => debug!("Session: acknowledgment for unknown parameter {}", id),
                }
                self.update_pending_gauge();
            }

            EngineEvent::LogReceived { level, message } => {
                match level {
                    LogLevel::Info => info!("Device: {}", message),
                    LogLevel::Warning => warn!("Device: {}", message),
                    LogLevel::Error => error!("Device: {}", message),
                }
                self.device_logs.push(DeviceLog {
                    level,
                    message,
                    timestamp: self.clock.now(),
                });
            }

            EngineEvent::PingAcknowledged => {
                debug!("Session: ping acknowledged");
                self.last_ping_ack = Some(self.clock.now());
            }

            EngineEvent::FrameRejected { command } => {
                debug!("Session: device frame {} rejected", command);
            }

            EngineEvent::CommandReceived { command, .. } => {
                debug!("Session: ignoring inbound command {}", command);
            }
        }
    }

    fn update_pending_gauge(&self) {
        metrics::gauge!(metric_defs::SESSION_PENDING_WRITES.name).set(self.pending_writes() as f64);
    }

    // ========================================================================
    // Parameter editing
    // ========================================================================

    fn require_connected(&self, operation: &'static str) -> SessionResult<()> {
        if self.state().is_connected() {
            Ok(())
        } else {
            Err(SessionError::invalid_state(self.state(), operation))
        }
    }

    fn engine_mut(&mut self, operation: &'static str) -> SessionResult<&mut ProtocolEngine<T>> {
        let state = self.state();
        self.engine
            .as_mut()
            .ok_or(SessionError::invalid_state(state, operation))
    }

    fn param_index(&self, id: u8, expected: Option<ParamType>) -> SessionResult<usize> {
        let index = self
            .params
            .iter()
            .position(|p| p.id == id)
            .ok_or(SessionError::UnknownParameter(id))?;
        let actual = self.params[index].param_type;
        match expected {
            Some(expected) if expected != actual => Err(SessionError::TypeMismatch {
                id,
                expected,
                actual,
            }),
            _ => Ok(index),
        }
    }

    fn commit_number(&mut self, index: usize) -> SessionResult<()> {
        let (id, value) = (self.params[index].id, self.params[index].value);
        self.engine_mut("write")?.write_value(id, value)?;
        let p = &mut self.params[index];
        p.last_sent_value = value;
        p.pending = true;
        self.update_pending_gauge();
        Ok(())
    }

    fn commit_text(&mut self, index: usize) -> SessionResult<()> {
        let id = self.params[index].id;
        let value = self.params[index].string_value.clone();
        self.engine_mut("write")?.write_string(id, &value)?;
        let p = &mut self.params[index];
        p.last_sent_string = value;
        p.pending = true;
        self.update_pending_gauge();
        Ok(())
    }

    /// Flip a toggle. Always sent.
    pub fn set_toggle(&mut self, id: u8, on: bool) -> SessionResult<()> {
        self.require_connected("set toggle")?;
        let index = self.param_index(id, Some(ParamType::Toggle))?;
        self.params[index].value = if on { 1.0 } else { 0.0 };
        self.commit_number(index)
    }

    /// Move a slider, clamped to its range. Sent only if it moved more than
    /// [`SLIDER_EPSILON`] from the last sent value; returns whether it was sent.
    pub fn set_slider(&mut self, id: u8, value: f32) -> SessionResult<bool> {
        self.require_connected("set slider")?;
        let index = self.param_index(id, Some(ParamType::Slider))?;
        let p = &mut self.params[index];
        p.value = clamp_to_range(value, p.min, p.max);
        if (p.value - p.last_sent_value).abs() > SLIDER_EPSILON {
            self.commit_number(index)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Set a numeric field, rounded to a whole number and clamped to its range.
    ///
    /// In edit mode the value is only staged; [`Session::end_edit`] sends it.
    /// Otherwise it is sent if it differs from the last sent value.
    pub fn set_numeric(&mut self, id: u8, value: f32) -> SessionResult<bool> {
        self.require_connected("set numeric")?;
        let index = self.param_index(id, Some(ParamType::Numeric))?;
        let p = &mut self.params[index];
        p.value = clamp_to_range(value.round(), p.min, p.max);
        if p.edit_mode || p.value == p.last_sent_value {
            return Ok(false);
        }
        self.commit_number(index)?;
        Ok(true)
    }

    /// Set a string. Staged in edit mode, otherwise sent if changed.
    pub fn set_string(&mut self, id: u8, value: &str) -> SessionResult<bool> {
        self.require_connected("set string")?;
        let index = self.param_index(id, Some(ParamType::String))?;
        let p = &mut self.params[index];
        p.string_value = value.to_string();
        if p.edit_mode || p.string_value == p.last_sent_string {
            return Ok(false);
        }
        self.commit_text(index)?;
        Ok(true)
    }

    /// Start editing a parameter.
    pub fn begin_edit(&mut self, id: u8) -> SessionResult<()> {
        self.require_connected("edit")?;
        let index = self.param_index(id, None)?;
        self.params[index].edit_mode = true;
        Ok(())
    }

    /// Finish editing; sends a numeric or string value if it changed.
    pub fn end_edit(&mut self, id: u8) -> SessionResult<bool> {
        self.require_connected("edit")?;
        let index = self.param_index(id, None)?;
        let p = &mut self.params[index];
        if !p.edit_mode {
            return Ok(false);
        }
        p.edit_mode = false;
        let param_type = p.param_type;
        let changed = match param_type {
            ParamType::Numeric => p.value != p.last_sent_value,
            ParamType::String => p.string_value != p.last_sent_string,
            ParamType::Toggle | ParamType::Slider => false,
        };
        if !changed {
            return Ok(false);
        }
        if param_type.is_text() {
            self.commit_text(index)?;
        } else {
            self.commit_number(index)?;
        }
        Ok(true)
    }

    /// Ask the device for every value.
    pub fn refresh_all(&mut self) -> SessionResult<()> {
        self.require_connected("refresh")?;
        self.engine_mut("refresh")?.request_all_values()?;
        Ok(())
    }

    /// Ask the device for one value.
    pub fn refresh(&mut self, id: u8) -> SessionResult<()> {
        self.require_connected("refresh")?;
        self.param_index(id, None)?;
        self.engine_mut("refresh")?.read_value(id)?;
        Ok(())
    }

    /// Send every non-string value positionally.
    pub fn write_all(&mut self) -> SessionResult<()> {
        self.require_connected("write all")?;
        let values: Vec<f32> = self
            .params
            .iter()
            .filter(|p| !p.param_type.is_text())
            .map(|p| p.value)
            .collect();
        self.engine_mut("write all")?.write_all(&values)?;
        for p in self.params.iter_mut().filter(|p| !p.param_type.is_text()) {
            p.last_sent_value = p.value;
        }
        Ok(())
    }

    /// Probe the device.
    pub fn ping(&mut self) -> SessionResult<()> {
        self.engine_mut("ping")?.send_ping()?;
        Ok(())
    }
}
