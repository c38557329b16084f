//! Session configuration.

use std::time::Duration;

use anvil_protocol::DEFAULT_READ_CHUNK;
use serde::{Deserialize, Serialize};

/// Baud rates offered for selection.
pub const STANDARD_BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

/// Session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long the welcome screen stays up, in milliseconds.
    pub welcome_timeout_ms: u64,
    /// Settle time before Connecting and FetchingSchema advance, in milliseconds.
    pub transition_delay_ms: u64,
    /// Device log entries kept before the oldest is dropped.
    pub max_device_logs: usize,
    /// Bytes pulled from the transport per tick.
    pub read_chunk: usize,
    /// Baud rate used when none is chosen.
    pub default_baud_rate: u32,
    /// Baud rates offered for selection.
    pub baud_rates: Vec<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            welcome_timeout_ms: 5_000,
            transition_delay_ms: 500,
            max_device_logs: 100,
            read_chunk: DEFAULT_READ_CHUNK,
            default_baud_rate: STANDARD_BAUD_RATES[0],
            baud_rates: STANDARD_BAUD_RATES.to_vec(),
        }
    }
}

impl SessionConfig {
    /// Welcome screen timeout.
    pub fn welcome_timeout(&self) -> Duration {
        Duration::from_millis(self.welcome_timeout_ms)
    }

    /// Transition settle time.
    pub fn transition_delay(&self) -> Duration {
        Duration::from_millis(self.transition_delay_ms)
    }
}
