//! Session integration tests against the device simulator.

use anvil_common::{ManualClock, TransportError, Transport};
use anvil_protocol::{DeviceParameter, LogLevel, ParamType};
use anvil_session::{ConnectionState, Session, SessionConfig, SessionError};
use anvil_sim::{DeviceCatalog, DeviceProfile, DeviceSimulator};
use approx::assert_relative_eq;

type SimSession = Session<DeviceSimulator<ManualClock>, ManualClock>;

fn new_session(config: SessionConfig) -> (SimSession, ManualClock) {
    session_over(DeviceCatalog::presets(), config)
}

fn session_over(catalog: DeviceCatalog, config: SessionConfig) -> (SimSession, ManualClock) {
    let clock = ManualClock::new();
    let sim = DeviceSimulator::new(catalog, clock.clone());
    let mut session = Session::new(sim, clock.clone(), config);
    session.dismiss_welcome();
    (session, clock)
}

/// Advance in 100 ms steps until `done` holds, failing after `limit_ms`.
fn run_until(session: &mut SimSession, clock: &ManualClock, limit_ms: u64, done: impl Fn(&SimSession) -> bool) {
    let mut elapsed = 0;
    while !done(session) {
        assert!(elapsed <= limit_ms, "condition not met after {} ms", limit_ms);
        clock.advance_millis(100);
        elapsed += 100;
        session.tick();
    }
}

fn connected(port: &str) -> (SimSession, ManualClock) {
    let (mut session, clock) = new_session(SessionConfig::default());
    session.connect(port, 9600).unwrap();
    run_until(&mut session, &clock, 5_000, |s| s.state() == ConnectionState::Connected);
    (session, clock)
}

fn settle_writes(session: &mut SimSession, clock: &ManualClock) {
    run_until(session, clock, 2_000, |s| s.pending_writes() == 0);
}

// ============================================================================
// Handshake
// ============================================================================

#[test]
fn test_full_handshake() {
    let (mut s, clock) = new_session(SessionConfig::default());
    s.connect("ttyMock1", 9600).unwrap();
    assert_eq!(s.status(), "STATUS: Connecting...");
    assert_eq!(s.panel_message(), Some("Establishing connection..."));

    clock.advance_millis(500);
    s.tick();
    assert_eq!(s.state(), ConnectionState::FetchingSchema);
    assert_eq!(s.panel_message(), Some("Retrieving device configuration..."));

    // Schema arrives one latency later; values one more latency after that
    clock.advance_millis(500);
    s.tick();
    assert_eq!(s.state(), ConnectionState::FetchingSchema);
    assert_eq!(s.parameters().len(), 2);

    clock.advance_millis(500);
    s.tick();
    assert_eq!(s.state(), ConnectionState::Connected);
    assert_eq!(s.status(), "STATUS: Connected");
    assert_eq!(s.panel_message(), None);

    let power = s.parameter(0).unwrap();
    assert_eq!(power.name, "Mock1 Power");
    assert_eq!(power.value, 1.0);
    assert_eq!(power.last_sent_value, 1.0);
    let level = s.parameter(1).unwrap();
    assert_eq!(level.param_type, ParamType::Slider);
    assert_eq!(level.value, 50.0);
}

#[test]
fn test_string_values_after_handshake() {
    let (s, _) = connected("ttyMock3");
    assert_eq!(s.parameters().len(), 8);
    assert_eq!(s.parameter(26).unwrap().string_value, "Hello");
    assert_eq!(s.parameter(27).unwrap().string_value, "World");
    assert_eq!(s.parameter(27).unwrap().last_sent_string, "World");
    assert_relative_eq!(s.parameter(25).unwrap().value, 456.0);
}

#[test]
fn test_failed_open_returns_to_disconnected() {
    let (mut s, _) = new_session(SessionConfig::default());
    let err = s.connect("ttyUSB9", 115200).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Transport(TransportError::UnknownPort(ref p)) if p == "ttyUSB9"
    ));
    assert_eq!(s.state(), ConnectionState::Disconnected);
    assert_eq!(s.status(), "STATUS: Disconnected");
    assert!(s.last_error().unwrap().starts_with("Connection failed:"));

    // A later attempt still works
    s.connect("ttyMock1", 9600).unwrap();
    assert!(s.last_error().is_none());
}

#[test]
fn test_disconnect_clears_device_state() {
    let (mut s, clock) = connected("ttyMock1");
    s.transport_mut().unwrap().inject_log(LogLevel::Info, "hello").unwrap();
    run_until(&mut s, &clock, 1_000, |s| !s.device_logs().is_empty());

    s.disconnect().unwrap();
    assert_eq!(s.state(), ConnectionState::Disconnected);
    assert!(s.parameters().is_empty());
    assert!(s.device_logs().is_empty());
    assert!(s.connected_port().is_none());
    assert!(s.engine().is_none());
    assert!(!s.transport_mut().unwrap().is_open());
}

#[test]
fn test_link_closed_mid_write() {
    let (mut s, _clock) = connected("ttyMock1");
    s.set_toggle(0, false).unwrap();
    assert_eq!(s.pending_writes(), 1);

    s.transport_mut().unwrap().close();
    s.tick();
    assert_eq!(s.state(), ConnectionState::Disconnected);
    assert_eq!(s.pending_writes(), 0);
    assert!(s.parameters().is_empty());
    assert!(s.last_error().unwrap().contains("lost"));
}

// ============================================================================
// Editing
// ============================================================================

#[test]
fn test_toggle_write_is_acknowledged() {
    let (mut s, clock) = connected("ttyMock1");
    s.set_toggle(0, false).unwrap();
    let power = s.parameter(0).unwrap();
    assert!(power.pending);
    assert_eq!(power.value, 0.0);
    assert_eq!(power.last_sent_value, 0.0);

    settle_writes(&mut s, &clock);
    assert_eq!(s.transport_mut().unwrap().parameters()[0].value, 0.0);

    s.refresh_all().unwrap();
    clock.advance_millis(500);
    s.tick();
    assert_eq!(s.parameter(0).unwrap().value, 0.0);
}

#[test]
fn test_slider_ignores_tiny_moves() {
    let (mut s, clock) = connected("ttyMock1");
    assert!(!s.set_slider(1, 50.0005).unwrap());
    assert_eq!(s.pending_writes(), 0);

    assert!(s.set_slider(1, 72.5).unwrap());
    settle_writes(&mut s, &clock);
    assert_eq!(s.transport_mut().unwrap().parameters()[1].value, 72.5);

    // Clamped to the slider range
    assert!(s.set_slider(1, 500.0).unwrap());
    assert_eq!(s.parameter(1).unwrap().value, 100.0);
}

#[test]
fn test_edits_survive_bad_device_ranges() {
    // Catalog built in code skips validation, like a misbehaving device
    let catalog = DeviceCatalog {
        devices: vec![DeviceProfile::new(
            "ttyOdd",
            vec![
                DeviceParameter::numeric(1, ParamType::Slider, "Backwards", 50.0, 100.0, 0.0),
                DeviceParameter::numeric(2, ParamType::Numeric, "Unbounded", 3.0, f32::NAN, 10.0),
            ],
        )],
    };
    let (mut s, clock) = session_over(catalog, SessionConfig::default());
    s.connect("ttyOdd", 9600).unwrap();
    run_until(&mut s, &clock, 5_000, |s| s.state() == ConnectionState::Connected);
    assert!(s.parameter(2).unwrap().min.is_nan());

    assert!(s.set_slider(1, 5.0).unwrap());
    assert_eq!(s.parameter(1).unwrap().value, 5.0);
    assert!(s.set_numeric(2, 7.4).unwrap());
    assert_eq!(s.parameter(2).unwrap().value, 7.0);

    settle_writes(&mut s, &clock);
    let device = s.transport_mut().unwrap().parameters();
    assert_eq!(device[0].value, 5.0);
    assert_eq!(device[1].value, 7.0);
}

#[test]
fn test_numeric_edit_mode_defers_commit() {
    let (mut s, clock) = connected("ttyMock2");
    s.begin_edit(13).unwrap();
    assert!(!s.set_numeric(13, 200.4).unwrap());
    assert_eq!(s.parameter(13).unwrap().value, 200.0);
    assert_eq!(s.pending_writes(), 0);

    assert!(s.end_edit(13).unwrap());
    assert!(!s.parameter(13).unwrap().edit_mode);
    settle_writes(&mut s, &clock);
    assert_eq!(s.transport_mut().unwrap().parameters()[3].value, 200.0);

    // Same value again is not resent
    assert!(!s.set_numeric(13, 200.0).unwrap());
}

#[test]
fn test_string_write() {
    let (mut s, clock) = connected("ttyMock3");
    assert!(!s.set_string(26, "Hello").unwrap());
    assert!(s.set_string(26, "Howdy").unwrap());
    settle_writes(&mut s, &clock);
    assert_eq!(s.transport_mut().unwrap().parameters()[6].string_value, "Howdy");

    s.refresh(26).unwrap();
    clock.advance_millis(500);
    s.tick();
    assert_eq!(s.parameter(26).unwrap().string_value, "Howdy");
}

#[test]
fn test_type_and_id_errors() {
    let (mut s, _) = connected("ttyMock1");
    assert!(matches!(
        s.set_toggle(1, true),
        Err(SessionError::TypeMismatch {
            id: 1,
            expected: ParamType::Toggle,
            actual: ParamType::Slider
        })
    ));
    assert!(matches!(s.set_slider(9, 1.0), Err(SessionError::UnknownParameter(9))));
    assert!(matches!(s.refresh(9), Err(SessionError::UnknownParameter(9))));
}

#[test]
fn test_write_all_sends_staged_values() {
    let (mut s, _) = connected("ttyMock2");
    s.begin_edit(13).unwrap();
    s.set_numeric(13, 300.0).unwrap();
    s.write_all().unwrap();

    let device: Vec<f32> = s.transport_mut().unwrap().parameters().iter().map(|p| p.value).collect();
    assert_eq!(device, vec![0.0, 1.0, 25.0, 300.0]);
    assert_eq!(s.parameter(13).unwrap().last_sent_value, 300.0);
}

// ============================================================================
// Device traffic
// ============================================================================

#[test]
fn test_device_log_is_capped() {
    let config = SessionConfig {
        max_device_logs: 3,
        ..Default::default()
    };
    let (mut s, clock) = new_session(config);
    s.connect("ttyMock1", 9600).unwrap();
    run_until(&mut s, &clock, 5_000, |s| s.state() == ConnectionState::Connected);

    for n in 0..5 {
        s.transport_mut()
            .unwrap()
            .inject_log(LogLevel::Warning, format!("event {}", n))
            .unwrap();
    }
    clock.advance_millis(500);
    s.tick();

    let messages: Vec<&str> = s.device_logs().iter().map(|l| l.message.as_str()).collect();
    assert_eq!(messages, vec!["event 2", "event 3", "event 4"]);
    assert!(s.device_logs().iter().all(|l| l.level == LogLevel::Warning));
}

#[test]
fn test_ping() {
    let (mut s, clock) = connected("ttyMock1");
    assert!(s.last_ping_ack().is_none());
    s.ping().unwrap();
    clock.advance_millis(500);
    s.tick();
    assert!(s.last_ping_ack().is_some());
}
