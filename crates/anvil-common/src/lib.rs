//! Common types and traits shared by the Anvil crates.
//!
//! - [`Transport`]: the byte-channel abstraction the protocol engine drives.
//! - [`Clock`] and [`SimTime`]: monotonic time, injectable for deterministic tests.

pub mod time;
pub mod transport;

pub use time::{Clock, ManualClock, SimTime, SystemClock};
pub use transport::{Transport, TransportError, TransportResult};
