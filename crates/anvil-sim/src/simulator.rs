//! The simulated device link.

use std::collections::VecDeque;
use std::time::Duration;

use anvil_common::{Clock, SimTime, SystemClock, Transport, TransportError, TransportResult};
use anvil_metrics::metric_defs;
use anvil_protocol::{
    DeviceParameter, Frame, FrameCodec, LogLevel, ProtocolError, Request, Response,
    SchemaIndex, NOT_FOUND_ID, PING_ACK,
};
use tracing::{debug, info, trace, warn};

use crate::catalog::DeviceCatalog;
use crate::config::{SimulatorConfig, DEFAULT_LATENCY_MS};
use crate::error::SimResult;

/// A response frame waiting for its delivery time.
#[derive(Debug, Clone)]
struct DelayedResponse {
    ready_at: SimTime,
    bytes: Vec<u8>,
}

/// The device behind an open link.
#[derive(Debug)]
struct ActiveDevice {
    port: String,
    params: Vec<DeviceParameter>,
    schema: SchemaIndex,
}

/// A [`Transport`] that behaves like a device from a [`DeviceCatalog`].
///
/// Requests are answered when written, but each answer only becomes readable
/// once the configured latency has passed on the simulator's [`Clock`].
pub struct DeviceSimulator<C: Clock = SystemClock> {
    clock: C,
    catalog: DeviceCatalog,
    latency: SimTime,
    active: Option<ActiveDevice>,
    codec: FrameCodec,
    queue: VecDeque<DelayedResponse>,
    delivery: VecDeque<u8>,
}

impl DeviceSimulator<SystemClock> {
    /// Simulator over the preset devices, on the wall clock.
    pub fn with_presets() -> Self {
        DeviceSimulator::new(DeviceCatalog::presets(), SystemClock::new())
    }
}

impl<C: Clock> DeviceSimulator<C> {
    /// Create a simulator with the default latency.
    pub fn new(catalog: DeviceCatalog, clock: C) -> Self {
        DeviceSimulator {
            clock,
            catalog,
            latency: SimTime::from_millis(DEFAULT_LATENCY_MS),
            active: None,
            codec: FrameCodec::new(),
            queue: VecDeque::new(),
            delivery: VecDeque::new(),
        }
    }

    /// Create a simulator from configuration, loading its catalog.
    pub fn from_config(config: &SimulatorConfig, clock: C) -> SimResult<Self> {
        let catalog = config.load_catalog()?;
        Ok(Self::new(catalog, clock).with_latency(config.latency()))
    }

    /// Set the response latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency.into();
        self
    }

    /// The device catalog.
    pub fn catalog(&self) -> &DeviceCatalog {
        &self.catalog
    }

    /// Response latency.
    pub fn latency(&self) -> Duration {
        self.latency.into()
    }

    /// Port of the open device.
    pub fn active_port(&self) -> Option<&str> {
        self.active.as_ref().map(|d| d.port.as_str())
    }

    /// Live parameter table of the open device; empty when closed.
    pub fn parameters(&self) -> &[DeviceParameter] {
        self.active.as_ref().map(|d| d.params.as_slice()).unwrap_or(&[])
    }

    /// Responses written but not yet deliverable.
    pub fn queued_responses(&self) -> usize {
        self.queue.len()
    }

    /// Queue a device-originated log line, delivered after the usual latency.
    pub fn inject_log(&mut self, level: LogLevel, message: impl Into<String>) -> SimResult<()> {
        if self.active.is_none() {
            return Err(TransportError::NotOpen.into());
        }
        let response = Response::Log {
            level,
            message: message.into(),
        };
        self.enqueue(&response)?;
        Ok(())
    }

    fn enqueue(&mut self, response: &Response) -> Result<(), ProtocolError> {
        let bytes = response.encode()?;
        let ready_at = self.clock.now() + self.latency;
        let port = self.active_port().unwrap_or_default().to_string();

        metrics::counter!(
            metric_defs::SIM_RESPONSES_QUEUED.name,
            "port" => port.clone(),
            "command" => response.command().name()
        )
        .increment(1);
        metrics::histogram!(metric_defs::SIM_RESPONSE_LATENCY.name, "port" => port.clone())
            .record(self.latency.as_micros() as f64 / 1_000.0);
        trace!(
            "Sim[{}]: queued {} ({} bytes) ready at {}",
            port,
            response.command(),
            bytes.len(),
            ready_at
        );

        self.queue.push_back(DelayedResponse { ready_at, bytes });
        Ok(())
    }

    fn handle_frame(&mut self, frame: Frame) {
        let Some(device) = self.active.as_mut() else {
            return;
        };

        let request = match Request::decode(&frame, &device.schema) {
            Ok(request) => request,
            Err(ProtocolError::UnknownParameter(id)) => {
                warn!("Sim[{}]: write to unknown parameter {}", device.port, id);
                self.respond(Response::WriteAck { id: NOT_FOUND_ID });
                return;
            }
            Err(ProtocolError::UnexpectedCommand(command)) => {
                debug!("Sim[{}]: ignoring {}", device.port, command);
                return;
            }
            Err(e) => {
                warn!("Sim[{}]: malformed {} request: {}", device.port, frame.command, e);
                return;
            }
        };

        let response = match request {
            Request::Ping => Some(Response::Pong { ack: Some(PING_ACK) }),

            Request::GetSchema => Some(Response::Schema(device.params.clone())),

            Request::ReadAll => Some(Response::Values(
                device
                    .params
                    .iter()
                    .map(|p| (p.id, p.current_value()))
                    .collect(),
            )),

            Request::ReadValue { id } => match device.params.iter().find(|p| p.id == id) {
                Some(p) => Some(Response::Value {
                    id,
                    value: p.current_value(),
                }),
                None => {
                    warn!("Sim[{}]: read of unknown parameter {}", device.port, id);
                    None
                }
            },

            Request::WriteValue { id, value } => {
                if let Some(p) = device.params.iter_mut().find(|p| p.id == id) {
                    // The schema lookup in decode already matched the value kind
                    if p.apply_value(&value).is_ok() {
                        info!("Sim[{}]: parameter {} updated to {}", device.port, id, value);
                    }
                }
                Some(Response::WriteAck { id })
            }

            Request::WriteAll { values } => {
                let numeric = device.params.iter_mut().filter(|p| !p.param_type.is_text());
                let mut updated = 0;
                for (p, v) in numeric.zip(&values) {
                    p.value = *v;
                    updated += 1;
                }
                if updated != values.len() {
                    warn!(
                        "Sim[{}]: write-all carried {} values for {} numeric parameters",
                        device.port,
                        values.len(),
                        updated
                    );
                }
                info!("Sim[{}]: write-all updated {} parameters", device.port, updated);
                None
            }
        };

        if let Some(response) = response {
            self.respond(response);
        }
    }

    fn respond(&mut self, response: Response) {
        if let Err(e) = self.enqueue(&response) {
            warn!(
                "Sim[{}]: cannot encode {} response: {}",
                self.active_port().unwrap_or_default(),
                response.command(),
                e
            );
        }
    }

    fn promote_ready(&mut self) {
        let now = self.clock.now();
        // Latency is uniform, so the queue is ordered by ready time
        while self.queue.front().is_some_and(|r| r.ready_at <= now) {
            if let Some(ready) = self.queue.pop_front() {
                self.delivery.extend(ready.bytes);
            }
        }
    }

    fn reset_link(&mut self) {
        self.queue.clear();
        self.delivery.clear();
        self.codec.clear();
    }
}

impl<C: Clock> Transport for DeviceSimulator<C> {
    fn open(&mut self, port: &str, _baud_rate: u32) -> TransportResult<()> {
        self.close();

        let profile = self
            .catalog
            .get(port)
            .ok_or_else(|| TransportError::UnknownPort(port.to_string()))?;
        let params = profile.parameters.clone();
        let schema = SchemaIndex::from_parameters(&params);
        info!("Sim[{}]: connected with {} parameters", port, params.len());

        self.active = Some(ActiveDevice {
            port: port.to_string(),
            params,
            schema,
        });
        self.reset_link();
        Ok(())
    }

    fn close(&mut self) {
        if let Some(device) = self.active.take() {
            info!("Sim[{}]: disconnected", device.port);
            self.reset_link();
        }
    }

    fn is_open(&self) -> bool {
        self.active.is_some()
    }

    fn write(&mut self, data: &[u8]) -> TransportResult<usize> {
        if self.active.is_none() {
            return Err(TransportError::NotOpen);
        }
        self.codec.push(data);
        for outcome in self.codec.decode_all() {
            match outcome {
                Ok(frame) => self.handle_frame(frame),
                Err(e) => warn!(
                    "Sim[{}]: dropping request: {}",
                    self.active_port().unwrap_or_default(),
                    e
                ),
            }
        }
        Ok(data.len())
    }

    fn read(&mut self, max_len: usize) -> Vec<u8> {
        if self.active.is_none() {
            return Vec::new();
        }
        self.promote_ready();
        let n = max_len.min(self.delivery.len());
        self.delivery.drain(..n).collect()
    }

    fn list_ports(&self) -> Vec<String> {
        self.catalog.ports()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_common::ManualClock;
    use anvil_protocol::{decode_frames, Command, ParamType, ParamValue};

    fn open_sim(port: &str) -> (DeviceSimulator<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let mut sim = DeviceSimulator::new(DeviceCatalog::presets(), clock.clone());
        sim.open(port, 9600).unwrap();
        (sim, clock)
    }

    fn responses(sim: &mut DeviceSimulator<ManualClock>, schema: &SchemaIndex) -> Vec<Response> {
        let (frames, rest) = decode_frames(&sim.read(4096));
        assert!(rest.is_empty());
        frames
            .into_iter()
            .map(|f| Response::decode(&f.unwrap(), schema).unwrap())
            .collect()
    }

    #[test]
    fn test_open_unknown_port() {
        let mut sim = DeviceSimulator::new(DeviceCatalog::presets(), ManualClock::new());
        assert!(matches!(
            sim.open("ttyUSB0", 9600),
            Err(TransportError::UnknownPort(p)) if p == "ttyUSB0"
        ));
        assert!(!sim.is_open());
        assert!(matches!(sim.write(&[0xAA]), Err(TransportError::NotOpen)));
        assert_eq!(sim.list_ports(), vec!["ttyMock1", "ttyMock2", "ttyMock3"]);
    }

    #[test]
    fn test_response_waits_for_latency() {
        let (mut sim, clock) = open_sim("ttyMock1");
        sim.write(&Request::Ping.encode().unwrap()).unwrap();
        assert_eq!(sim.queued_responses(), 1);

        clock.advance_millis(499);
        assert!(sim.read(64).is_empty());

        clock.advance_millis(1);
        assert_eq!(sim.read(64), vec![0xAA, 0x00, 0x01, 0x00, 0x01, 0x01]);
        assert_eq!(sim.queued_responses(), 0);
    }

    #[test]
    fn test_read_respects_max_len() {
        let (mut sim, clock) = open_sim("ttyMock1");
        sim.write(&Request::Ping.encode().unwrap()).unwrap();
        clock.advance_millis(500);
        assert_eq!(sim.read(4).len(), 4);
        assert_eq!(sim.read(4).len(), 2);
        assert!(sim.read(4).is_empty());
    }

    #[test]
    fn test_write_value_updates_and_acks() {
        let (mut sim, clock) = open_sim("ttyMock2");
        let write = Request::WriteValue {
            id: 12,
            value: ParamValue::Number(120.0),
        };
        sim.write(&write.encode().unwrap()).unwrap();
        assert_eq!(sim.parameters()[2].value, 120.0);

        clock.advance_millis(500);
        let schema = SchemaIndex::from_parameters(sim.parameters());
        assert_eq!(responses(&mut sim, &schema), vec![Response::WriteAck { id: 12 }]);
    }

    #[test]
    fn test_write_unknown_id_acks_not_found() {
        let (mut sim, clock) = open_sim("ttyMock1");
        let write = Request::WriteValue {
            id: 42,
            value: ParamValue::Number(1.0),
        };
        sim.write(&write.encode().unwrap()).unwrap();
        clock.advance_millis(500);
        assert_eq!(
            responses(&mut sim, &SchemaIndex::default()),
            vec![Response::WriteAck { id: NOT_FOUND_ID }]
        );
    }

    #[test]
    fn test_write_all_updates_numeric_in_order() {
        let (mut sim, clock) = open_sim("ttyMock3");
        let values: Vec<f32> = (1..=6).map(|v| v as f32).collect();
        sim.write(&Request::WriteAll { values }.encode().unwrap()).unwrap();

        let numeric: Vec<f32> = sim
            .parameters()
            .iter()
            .filter(|p| p.param_type != ParamType::String)
            .map(|p| p.value)
            .collect();
        assert_eq!(numeric, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(sim.parameters()[6].string_value, "Hello");

        clock.advance_millis(1000);
        assert!(sim.read(64).is_empty());
    }

    #[test]
    fn test_read_value() {
        let (mut sim, clock) = open_sim("ttyMock3");
        sim.write(&Request::ReadValue { id: 27 }.encode().unwrap()).unwrap();
        sim.write(&Request::ReadValue { id: 99 }.encode().unwrap()).unwrap();
        clock.advance_millis(500);

        let schema = SchemaIndex::from_parameters(sim.parameters());
        assert_eq!(
            responses(&mut sim, &schema),
            vec![Response::Value {
                id: 27,
                value: ParamValue::Text("World".into())
            }]
        );
    }

    #[test]
    fn test_partial_and_corrupt_requests() {
        let (mut sim, clock) = open_sim("ttyMock1");
        let ping = Request::Ping.encode().unwrap();
        let mut bad = Request::ReadValue { id: 0 }.encode().unwrap();
        let last = bad.len() - 1;
        bad[last] ^= 0x55;

        sim.write(&bad).unwrap();
        sim.write(&ping[..2]).unwrap();
        assert_eq!(sim.queued_responses(), 0);
        sim.write(&ping[2..]).unwrap();
        assert_eq!(sim.queued_responses(), 1);

        clock.advance_millis(500);
        let (frames, _) = decode_frames(&sim.read(64));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref().unwrap().command, Command::Ping);
    }

    #[test]
    fn test_close_drops_pending_and_reopen_resets_table() {
        let (mut sim, clock) = open_sim("ttyMock1");
        let write = Request::WriteValue {
            id: 1,
            value: ParamValue::Number(5.0),
        };
        sim.write(&write.encode().unwrap()).unwrap();
        sim.close();
        sim.close();
        assert!(sim.parameters().is_empty());
        assert_eq!(sim.queued_responses(), 0);

        sim.open("ttyMock1", 115200).unwrap();
        clock.advance_millis(500);
        assert!(sim.read(64).is_empty());
        assert_eq!(sim.parameters()[1].value, 50.0);
    }

    #[test]
    fn test_inject_log() {
        let mut sim = DeviceSimulator::new(DeviceCatalog::presets(), ManualClock::new());
        assert!(sim.inject_log(LogLevel::Info, "boot").is_err());

        let (mut sim, clock) = open_sim("ttyMock1");
        sim.inject_log(LogLevel::Warning, "low battery").unwrap();
        clock.advance_millis(500);
        assert_eq!(
            responses(&mut sim, &SchemaIndex::default()),
            vec![Response::Log {
                level: LogLevel::Warning,
                message: "low battery".into()
            }]
        );
    }

    #[test]
    fn test_custom_latency() {
        let clock = ManualClock::new();
        let mut sim = DeviceSimulator::new(DeviceCatalog::presets(), clock.clone())
            .with_latency(Duration::from_millis(20));
        sim.open("ttyMock1", 9600).unwrap();
        sim.write(&Request::Ping.encode().unwrap()).unwrap();
        clock.advance_millis(20);
        assert!(!sim.read(64).is_empty());
    }
}
