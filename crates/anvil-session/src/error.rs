//! Session error types.

use anvil_common::TransportError;
use anvil_protocol::{ParamType, ProtocolError};
use thiserror::Error;

use crate::state::ConnectionState;

/// Errors returned by [`Session`](crate::Session) operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The operation is not allowed in the current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// Current state.
        state: ConnectionState,
        /// Attempted operation.
        operation: &'static str,
    },

    /// No parameter with this id.
    #[error("unknown parameter id: {0}")]
    UnknownParameter(u8),

    /// The parameter has a different type than the operation needs.
    #[error("parameter {id} is {actual}, expected {expected}")]
    TypeMismatch {
        /// Parameter id.
        id: u8,
        /// Type the operation needs.
        expected: ParamType,
        /// Declared type.
        actual: ParamType,
    },

    /// The transport could not be opened.
    #[error("connection failed: {0}")]
    Transport(#[from] TransportError),

    /// Sending failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl SessionError {
    /// Shorthand for [`SessionError::InvalidState`].
    pub fn invalid_state(state: ConnectionState, operation: &'static str) -> Self {
        SessionError::InvalidState { state, operation }
    }
}

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
