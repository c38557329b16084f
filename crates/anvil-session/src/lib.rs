//! Controller-side session for Anvil devices.
//!
//! A [`Session`] walks a [`ConnectionStateMachine`] through the handshake
//! (connect, fetch schema, fetch values, live control), owns the protocol
//! engine while a link is up, and keeps the parameter table and device log an
//! operator front end renders.
//!
//! ```rust,ignore
//! use anvil_session::{Session, SessionConfig};
//!
//! let mut session = Session::new(transport, clock, SessionConfig::default());
//! session.dismiss_welcome();
//! session.connect("ttyMock1", 9600)?;
//! while !session.state().is_connected() {
//!     session.tick();
//! }
//! session.set_toggle(0, false)?;
//! ```

mod config;
mod device_log;
mod error;
mod session;
mod state;

pub use config::*;
pub use device_log::*;
pub use error::*;
pub use session::*;
pub use state::*;
