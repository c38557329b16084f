//! Simulator configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::DeviceCatalog;
use crate::error::SimResult;

/// Default delay before a simulated device answers.
pub const DEFAULT_LATENCY_MS: u64 = 500;

/// Simulator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Delay applied to every response, in milliseconds.
    pub latency_ms: u64,
    /// YAML catalog to load instead of the built-in presets.
    pub catalog: Option<PathBuf>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            latency_ms: DEFAULT_LATENCY_MS,
            catalog: None,
        }
    }
}

impl SimulatorConfig {
    /// Response latency.
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    /// The configured catalog, or the presets when none is set.
    pub fn load_catalog(&self) -> SimResult<DeviceCatalog> {
        match &self.catalog {
            Some(path) => DeviceCatalog::from_path(path),
            None => Ok(DeviceCatalog::presets()),
        }
    }
}
