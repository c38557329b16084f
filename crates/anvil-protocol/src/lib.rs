//! Anvil device configuration protocol
//!
//! A compact binary protocol for reading and writing configuration parameters
//! (toggles, sliders, numeric fields, strings) on an embedded device over a
//! point-to-point byte stream. A master (controller) issues requests and a
//! slave (device) answers them.
//!
//! # Wire format
//!
//! ```text
//! +------+-----+--------+--------+-------------------+----------+
//! | 0xAA | cmd | len_lo | len_hi | payload[0..len]   | checksum |
//! +------+-----+--------+--------+-------------------+----------+
//! ```
//!
//! The checksum is the XOR of the payload bytes only.
//!
//! # Layers
//!
//! - [`FrameCodec`]: incremental framing with resynchronization and checksum checks.
//! - [`Request`] / [`Response`]: typed payloads for each [`Command`].
//! - [`ProtocolEngine`]: owns a [`Transport`](anvil_common::Transport), polls it once per
//!   tick and turns decoded frames into [`EngineEvent`]s.
//!
//! # Example
//!
//! ```rust,ignore
//! use anvil_protocol::{EngineEvent, ProtocolEngine};
//!
//! let mut engine = ProtocolEngine::new(transport);
//! engine.request_schema()?;
//! loop {
//!     for event in engine.tick() {
//!         if let EngineEvent::SchemaReceived(params) = event {
//!             engine.request_all_values()?;
//!         }
//!     }
//! }
//! ```

mod commands;
mod constants;
mod engine;
mod error;
mod frame;
mod payload;
mod responses;
mod types;

pub use commands::*;
pub use constants::*;
pub use engine::*;
pub use error::*;
pub use frame::*;
pub use payload::*;
pub use responses::*;
pub use types::*;
