//! Simulator error types.

use anvil_common::TransportError;
use anvil_protocol::ProtocolError;
use thiserror::Error;

/// Errors raised while loading catalogs or driving the simulator.
#[derive(Debug, Error)]
pub enum SimError {
    /// Catalog file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog file is not valid YAML for a catalog.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Catalog parsed but breaks a wire-level limit.
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Simulated link is not usable.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A response could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl SimError {
    /// Shorthand for [`SimError::InvalidCatalog`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        SimError::InvalidCatalog(msg.into())
    }
}

/// Result type alias for simulator operations.
pub type SimResult<T> = Result<T, SimError>;
