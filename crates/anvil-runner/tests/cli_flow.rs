//! Runner commands end to end against the simulator on a manual clock.

use anvil_common::{Clock, ManualClock, SimTime};
use anvil_runner::{execute, Assignment, Cli, RunnerConfig, RunnerError, Runner};
use anvil_session::{ConnectionState, SessionError};
use approx::assert_relative_eq;
use clap::Parser;

fn run(args: &[&str]) -> Result<String, RunnerError> {
    let cli = Cli::try_parse_from(std::iter::once("anvil").chain(args.iter().copied())).unwrap();
    let config = cli.runner_config()?;
    execute(&cli, &config, ManualClock::new())
}

fn assignments(raw: &[&str]) -> Vec<Assignment> {
    raw.iter().map(|r| r.parse().unwrap()).collect()
}

#[test]
fn test_ports() {
    assert_eq!(run(&["ports"]).unwrap(), "ttyMock1\nttyMock2\nttyMock3");
}

#[test]
fn test_show_text() {
    let out = run(&["show", "--port", "ttyMock1"]).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "ttyMock1 @ 9600 baud");
    assert!(lines[2].contains("Mock1 Power") && lines[2].ends_with("on"));
    assert!(lines[3].ends_with("50 [0..100]"));
}

#[test]
fn test_show_json() {
    let out = run(&["show", "--port", "ttyMock3", "--baud", "57600", "--json"]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["port"], "ttyMock3");
    assert_eq!(value["baud_rate"], 57600);
    let params = value["parameters"].as_array().unwrap();
    assert_eq!(params.len(), 8);
    assert_eq!(params[7]["name"], "Str 2");
    assert_eq!(params[7]["string_value"], "World");
}

#[test]
fn test_set_writes_every_type() {
    let out = run(&[
        "set", "--port", "ttyMock3", "--json", "--param", "20=on", "--param", "22=33.5", "--param",
        "24=2000", "--param", "27=Earth",
    ])
    .unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    let params = &value["parameters"];
    assert_eq!(params[0]["value"], 1.0);
    assert_eq!(params[2]["value"], 33.5);
    // Numeric fields clamp to their range
    assert_eq!(params[4]["value"], 1000.0);
    assert_eq!(params[7]["string_value"], "Earth");
}

#[test]
fn test_runner_reports_device_state_after_set() {
    let clock = ManualClock::new();
    let mut runner = Runner::new(&RunnerConfig::default(), clock.clone()).unwrap();
    runner.connect("ttyMock2", None).unwrap();
    // Connecting and FetchingSchema each settle for 500 ms, values take one more latency
    assert!(clock.now() >= SimTime::from_millis(1_500));

    let sent = runner.apply(&assignments(&["11=off", "12=199.5", "13=150"])).unwrap();
    assert_eq!(sent, 2, "13 already holds 150");
    assert_eq!(runner.session().pending_writes(), 0);
    assert_relative_eq!(runner.session().parameter(12).unwrap().value, 199.5);

    runner.disconnect().unwrap();
    assert_eq!(runner.session().state(), ConnectionState::Disconnected);
    runner.disconnect().unwrap();
}

#[test]
fn test_unknown_port() {
    let err = run(&["show", "--port", "ttyUSB0"]).unwrap_err();
    assert!(matches!(err, RunnerError::Session(SessionError::Transport(_))), "{:?}", err);
}

#[test]
fn test_unknown_parameter_and_bad_value() {
    let err = run(&["set", "--port", "ttyMock1", "--param", "99=1"]).unwrap_err();
    assert!(matches!(err, RunnerError::Session(SessionError::UnknownParameter(99))));

    let err = run(&["set", "--port", "ttyMock1", "--param", "1=loud"]).unwrap_err();
    assert!(matches!(err, RunnerError::InvalidArgument(_)));
}

#[test]
fn test_timeout_when_device_is_too_slow() {
    let err = run(&["show", "--port", "ttyMock1", "--latency-ms", "60000", "--timeout-ms", "3000"])
        .unwrap_err();
    assert!(matches!(
        err,
        RunnerError::Timeout {
            timeout_ms: 3000,
            ..
        }
    ));
}

#[test]
fn test_custom_catalog_file() {
    let dir = std::env::temp_dir().join(format!("anvil-runner-catalog-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let catalog = dir.join("bench.yaml");
    std::fs::write(
        &catalog,
        r#"
devices:
  - port: ttyBench
    parameters:
      - id: 7
        type: numeric
        name: Setpoint
        value: 40
        min: 0
        max: 90
"#,
    )
    .unwrap();

    let path = catalog.to_string_lossy().to_string();
    assert_eq!(run(&["--catalog", &path, "ports"]).unwrap(), "ttyBench");
    let out = run(&["--catalog", &path, "set", "-p", "ttyBench", "--param", "7=55"]).unwrap();
    assert!(out.lines().last().unwrap().ends_with("55 [0..90]"), "{}", out);

    std::fs::remove_dir_all(&dir).unwrap();
}
