//! End-to-end tests: a protocol engine talking to the simulator.

use anvil_common::{ManualClock, Transport};
use anvil_protocol::{EngineEvent, ParamType, ParamValue, ProtocolEngine, NOT_FOUND_ID};
use anvil_sim::{DeviceCatalog, DeviceProfile, DeviceSimulator};
use approx::assert_relative_eq;

/// Helper: open `port` and wrap it in an engine.
fn connect(
    catalog: DeviceCatalog,
    port: &str,
) -> (ProtocolEngine<DeviceSimulator<ManualClock>>, ManualClock) {
    let clock = ManualClock::new();
    let mut sim = DeviceSimulator::new(catalog, clock.clone());
    sim.open(port, 9600).expect("open should succeed");
    (ProtocolEngine::new(sim), clock)
}

/// Helper: let the latency elapse and collect every event.
fn settle(engine: &mut ProtocolEngine<DeviceSimulator<ManualClock>>, clock: &ManualClock) -> Vec<EngineEvent> {
    clock.advance_millis(500);
    let mut events = Vec::new();
    loop {
        let batch = engine.tick();
        if batch.is_empty() {
            return events;
        }
        events.extend(batch);
    }
}

// ============================================================================
// Handshake
// ============================================================================

#[test]
fn test_toggle_write_roundtrip() {
    let catalog = DeviceCatalog {
        devices: vec![DeviceProfile::new(
            "ttyToggle",
            vec![anvil_protocol::DeviceParameter::numeric(
                5,
                ParamType::Toggle,
                "Relay",
                1.0,
                0.0,
                1.0,
            )],
        )],
    };
    let (mut engine, clock) = connect(catalog, "ttyToggle");

    engine.request_schema().unwrap();
    engine.request_all_values().unwrap();
    // Values cannot be decoded until the schema has been seen, so they must be
    // delivered in the same order they were requested.
    let events = settle(&mut engine, &clock);
    assert_eq!(events.len(), 2);
    match &events[0] {
        EngineEvent::SchemaReceived(params) => {
            assert_eq!(params.len(), 1);
            assert_eq!(params[0].id, 5);
            assert_eq!(params[0].name, "Relay");
            assert_eq!(params[0].param_type, ParamType::Toggle);
        }
        other => panic!("expected schema, got {:?}", other),
    }
    assert_eq!(events[1], EngineEvent::ValuesReceived(vec![(5, ParamValue::Number(1.0))]));

    engine.write_value(5, 0.0).unwrap();
    assert!(engine.tick().is_empty(), "ack must wait for the latency");
    let events = settle(&mut engine, &clock);
    assert_eq!(events, vec![EngineEvent::WriteAcknowledged(5)]);

    engine.request_all_values().unwrap();
    let events = settle(&mut engine, &clock);
    assert_eq!(events, vec![EngineEvent::ValuesReceived(vec![(5, ParamValue::Number(0.0))])]);
}

#[test]
fn test_string_parameters_decode_with_defaults() {
    let (mut engine, clock) = connect(DeviceCatalog::presets(), "ttyMock3");

    engine.request_schema().unwrap();
    engine.request_all_values().unwrap();
    let events = settle(&mut engine, &clock);

    let mut params = match &events[0] {
        EngineEvent::SchemaReceived(params) => params.clone(),
        other => panic!("expected schema, got {:?}", other),
    };
    let values = match &events[1] {
        EngineEvent::ValuesReceived(values) => values.clone(),
        other => panic!("expected values, got {:?}", other),
    };
    assert_eq!(values.len(), 8);
    for (id, value) in &values {
        let p = params.iter_mut().find(|p| p.id == *id).unwrap();
        p.apply_value(value).unwrap();
    }

    let strings: Vec<(&str, &str)> = params
        .iter()
        .filter(|p| p.param_type == ParamType::String)
        .map(|p| (p.name.as_str(), p.string_value.as_str()))
        .collect();
    assert_eq!(strings, vec![("Str 1", "Hello"), ("Str 2", "World")]);
    assert_relative_eq!(params[4].value, 123.0);
}

// ============================================================================
// Other commands
// ============================================================================

#[test]
fn test_string_write_and_single_read() {
    let (mut engine, clock) = connect(DeviceCatalog::presets(), "ttyMock3");
    engine.request_schema().unwrap();
    settle(&mut engine, &clock);

    engine.write_string(26, "Howdy").unwrap();
    engine.read_value(26).unwrap();
    let events = settle(&mut engine, &clock);
    assert_eq!(
        events,
        vec![
            EngineEvent::WriteAcknowledged(26),
            EngineEvent::ValuesReceived(vec![(26, ParamValue::Text("Howdy".into()))]),
        ]
    );
}

#[test]
fn test_ping_unknown_write_and_log() {
    let (mut engine, clock) = connect(DeviceCatalog::presets(), "ttyMock1");
    engine.send_ping().unwrap();
    engine.write_value(77, 1.0).unwrap();
    engine
        .transport_mut()
        .inject_log(anvil_protocol::LogLevel::Error, "sensor fault")
        .unwrap();

    let events = settle(&mut engine, &clock);
    assert_eq!(
        events,
        vec![
            EngineEvent::PingAcknowledged,
            EngineEvent::WriteAcknowledged(NOT_FOUND_ID),
            EngineEvent::LogReceived {
                level: anvil_protocol::LogLevel::Error,
                message: "sensor fault".into()
            },
        ]
    );
}

#[test]
fn test_write_all_then_read_back() {
    let (mut engine, clock) = connect(DeviceCatalog::presets(), "ttyMock2");
    engine.request_schema().unwrap();
    settle(&mut engine, &clock);

    engine.write_all(&[1.0, 0.0, 199.5, 42.0]).unwrap();
    engine.request_all_values().unwrap();
    let events = settle(&mut engine, &clock);
    assert_eq!(
        events,
        vec![EngineEvent::ValuesReceived(vec![
            (10, ParamValue::Number(1.0)),
            (11, ParamValue::Number(0.0)),
            (12, ParamValue::Number(199.5)),
            (13, ParamValue::Number(42.0)),
        ])]
    );
}

#[test]
fn test_engine_hands_back_transport() {
    let (mut engine, clock) = connect(DeviceCatalog::presets(), "ttyMock1");
    engine.request_schema().unwrap();
    let mut sim = engine.into_transport();
    assert_eq!(sim.active_port(), Some("ttyMock1"));
    sim.close();

    let mut engine = ProtocolEngine::new(sim);
    clock.advance_millis(500);
    assert!(engine.tick().is_empty());
    assert!(engine.request_schema().is_err());
}
