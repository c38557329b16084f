//! Headless front end for Anvil devices.
//!
//! Builds a [`anvil_session::Session`] over the device simulator and drives it
//! from the command line: list ports, show a device's parameter table, or
//! write parameters and wait for the device to acknowledge them.

mod cli;
mod config;
mod error;
mod logging;
mod report;
mod runner;

pub use cli::*;
pub use config::*;
pub use error::*;
pub use logging::*;
pub use report::*;
pub use runner::*;
