//! Runner configuration file.
//!
//! ```yaml
//! session:
//!   transition_delay_ms: 200
//! simulator:
//!   latency_ms: 50
//!   catalog: devices.yaml
//! tick_interval_ms: 10
//! timeout_ms: 10000
//! ```

use std::path::Path;
use std::time::Duration;

use anvil_session::SessionConfig;
use anvil_sim::SimulatorConfig;
use serde::{Deserialize, Serialize};

use crate::error::RunnerResult;

/// Everything the runner needs to build a session over the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Session settings.
    pub session: SessionConfig,
    /// Simulator settings.
    pub simulator: SimulatorConfig,
    /// Pause between session ticks, in milliseconds.
    pub tick_interval_ms: u64,
    /// Longest wait for any one device exchange, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            session: SessionConfig::default(),
            simulator: SimulatorConfig::default(),
            tick_interval_ms: 10,
            timeout_ms: 10_000,
        }
    }
}

impl RunnerConfig {
    /// Parse a YAML config.
    pub fn from_yaml_str(yaml: &str) -> RunnerResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a YAML config file.
    ///
    /// A relative catalog path is resolved against the config file's directory.
    pub fn from_path<P: AsRef<Path>>(path: P) -> RunnerResult<Self> {
        let path = path.as_ref();
        let mut config = Self::from_yaml_str(&std::fs::read_to_string(path)?)?;
        if let (Some(catalog), Some(dir)) = (&config.simulator.catalog, path.parent()) {
            if catalog.is_relative() {
                config.simulator.catalog = Some(dir.join(catalog));
            }
        }
        Ok(config)
    }

    /// Pause between ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Per-exchange timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
