//! Device simulator for the Anvil protocol.
//!
//! [`DeviceSimulator`] implements [`Transport`](anvil_common::Transport) and
//! answers every request the way a real device would, after an artificial
//! delay. Devices come from a [`DeviceCatalog`]: three built-in presets by
//! default, or a YAML file.

mod catalog;
mod config;
mod error;
mod simulator;

pub use catalog::*;
pub use config::*;
pub use error::*;
pub use simulator::*;
