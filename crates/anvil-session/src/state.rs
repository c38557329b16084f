//! Connection lifecycle state machine.
//!
//! ```text
//! Welcome --WelcomeTimer--> Disconnected --Connect--> Connecting
//! Connecting --ConnectionSuccess--> FetchingSchema --SchemaReceived--> Connected
//! Connecting | FetchingSchema | Connected --ConnectionFailed--> Disconnected
//! FetchingSchema | Connected --Disconnect--> Disconnected
//! ```
//!
//! Any pair not in [`TRANSITIONS`] is rejected and leaves the state unchanged.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

/// Lifecycle state of the controller's link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConnectionState {
    /// Splash screen; initial and never re-entered.
    Welcome,
    /// No link.
    Disconnected,
    /// Link opened, waiting to settle.
    Connecting,
    /// Schema requested, waiting for it and the first values.
    FetchingSchema,
    /// Live control.
    Connected,
}

impl ConnectionState {
    /// Name used in logs and metric labels.
    pub fn name(self) -> &'static str {
        match self {
            ConnectionState::Welcome => "Welcome",
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::FetchingSchema => "FetchingSchema",
            ConnectionState::Connected => "Connected",
        }
    }

    /// Whether live control is possible.
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }

    /// Whether a protocol engine exists in this state.
    pub fn has_link(self) -> bool {
        matches!(self, ConnectionState::FetchingSchema | ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The welcome screen timed out or was dismissed.
    WelcomeTimer,
    /// Operator asked to connect.
    Connect {
        /// Port identity.
        port: String,
        /// Requested baud rate.
        baud_rate: u32,
    },
    /// The link is up.
    ConnectionSuccess,
    /// The link could not be opened or was lost.
    ConnectionFailed,
    /// Schema and values have arrived.
    SchemaReceived,
    /// Operator asked to disconnect.
    Disconnect,
}

impl ConnectionEvent {
    /// Payload-free discriminant used for table lookup.
    pub fn kind(&self) -> EventKind {
        match self {
            ConnectionEvent::WelcomeTimer => EventKind::WelcomeTimer,
            ConnectionEvent::Connect { .. } => EventKind::Connect,
            ConnectionEvent::ConnectionSuccess => EventKind::ConnectionSuccess,
            ConnectionEvent::ConnectionFailed => EventKind::ConnectionFailed,
            ConnectionEvent::SchemaReceived => EventKind::SchemaReceived,
            ConnectionEvent::Disconnect => EventKind::Disconnect,
        }
    }
}

/// Kind of a [`ConnectionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [`ConnectionEvent::WelcomeTimer`].
    WelcomeTimer,
    /// See [`ConnectionEvent::Connect`].
    Connect,
    /// See [`ConnectionEvent::ConnectionSuccess`].
    ConnectionSuccess,
    /// See [`ConnectionEvent::ConnectionFailed`].
    ConnectionFailed,
    /// See [`ConnectionEvent::SchemaReceived`].
    SchemaReceived,
    /// See [`ConnectionEvent::Disconnect`].
    Disconnect,
}

/// Side effect attached to a transition. The session performs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAction {
    /// Open the transport.
    OpenConnection,
    /// Ask the device for its schema.
    RequestSchema,
    /// Close the transport.
    CloseConnection,
}

/// Outcome of [`ConnectionStateMachine::process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The state changed.
    Accepted {
        /// State before.
        from: ConnectionState,
        /// State after.
        to: ConnectionState,
        /// Side effect, if any.
        action: Option<TransitionAction>,
    },
    /// The event is not valid in the current state.
    Rejected {
        /// Unchanged state.
        state: ConnectionState,
        /// Rejected event.
        event: EventKind,
    },
}

impl Transition {
    /// Whether the state changed.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Transition::Accepted { .. })
    }
}

use ConnectionState as S;
use EventKind as E;
use TransitionAction as A;

/// Every legal (state, event) pair.
pub const TRANSITIONS: &[(ConnectionState, EventKind, Option<TransitionAction>, ConnectionState)] = &[
    (S::Welcome, E::WelcomeTimer, None, S::Disconnected),
    (S::Disconnected, E::Connect, Some(A::OpenConnection), S::Connecting),
    (S::Connecting, E::ConnectionSuccess, Some(A::RequestSchema), S::FetchingSchema),
    (S::Connecting, E::ConnectionFailed, None, S::Disconnected),
    (S::FetchingSchema, E::SchemaReceived, None, S::Connected),
    (S::FetchingSchema, E::ConnectionFailed, None, S::Disconnected),
    (S::FetchingSchema, E::Disconnect, Some(A::CloseConnection), S::Disconnected),
    (S::Connected, E::Disconnect, Some(A::CloseConnection), S::Disconnected),
    (S::Connected, E::ConnectionFailed, None, S::Disconnected),
];

/// The connection lifecycle state machine.
#[derive(Debug, Clone)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateMachine {
    /// Start in [`ConnectionState::Welcome`].
    pub fn new() -> Self {
        ConnectionStateMachine {
            state: ConnectionState::Welcome,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the machine is in `state`.
    pub fn is(&self, state: ConnectionState) -> bool {
        self.state == state
    }

    /// Feed an event.
    pub fn process(&mut self, event: &ConnectionEvent) -> Transition {
        let kind = event.kind();
        let entry = TRANSITIONS
            .iter()
            .find(|(from, ev, _, _)| *from == self.state && *ev == kind);

        let Some(&(from, _, action, to)) = entry else {
            debug!("StateMachine: ignoring {:?} in {}", kind, self.state);
            return Transition::Rejected {
                state: self.state,
                event: kind,
            };
        };

        match (action, event) {
            (Some(A::OpenConnection), ConnectionEvent::Connect { port, baud_rate }) => {
                info!("StateMachine: opening connection to {} at {} baud", port, baud_rate);
            }
            (Some(A::RequestSchema), _) => info!("StateMachine: requesting schema from device"),
            (Some(A::CloseConnection), _) => info!("StateMachine: closing connection"),
            _ => {}
        }

        debug!("StateMachine: {} -> {}", from, to);
        self.state = to;
        Transition::Accepted { from, to, action }
    }
}
