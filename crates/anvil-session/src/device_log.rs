//! Log lines sent by the device.

use std::collections::VecDeque;

use anvil_common::SimTime;
use anvil_protocol::LogLevel;
use serde::Serialize;

/// One device log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceLog {
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
    /// Session clock time of arrival.
    pub timestamp: SimTime,
}

/// Bounded device log; the oldest entry goes when full.
#[derive(Debug, Clone)]
pub struct DeviceLogBuffer {
    entries: VecDeque<DeviceLog>,
    capacity: usize,
}

impl DeviceLogBuffer {
    /// Create a buffer holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        DeviceLogBuffer {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append an entry.
    pub fn push(&mut self, entry: DeviceLog) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceLog> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
