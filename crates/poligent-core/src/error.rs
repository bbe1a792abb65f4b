//! Core error types for poligent

use poligent_protocol::{Operation, ProtocolError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::PeerId;

/// Errors from a single remote management operation
#[derive(Error, Debug)]
pub enum ManagementError {
    /// Peer answered with a non-success status
    #[error("{operation} {name} rejected with status {status_code}: {description}")]
    Rejected {
        operation: Operation,
        name: String,
        status_code: u16,
        description: String,
    },

    /// No response within the request timeout
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: Operation,
        timeout: Duration,
    },

    /// Connection to the peer is gone
    #[error("Connection closed")]
    ConnectionClosed,

    /// Unit carries no string `name` to address it by
    #[error("Unit has no name")]
    UnnamedUnit,

    /// Wire protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Errors ending a sync cycle against one peer
#[derive(Error, Debug)]
pub enum SyncError {
    /// Could not retrieve the peer's actual state
    #[error("failed to fetch actual state: {0}")]
    Fetch(#[source] ManagementError),

    /// A corrective operation failed
    #[error("failed to {operation} {unit}: {source}")]
    Apply {
        operation: Operation,
        unit: String,
        #[source]
        source: ManagementError,
    },

    /// The pass limit was reached while operations were still pending
    #[error("not converged after {passes} passes")]
    NotConverged { passes: u32 },

    /// The peer disconnected before the cycle could run
    #[error("peer {0} is no longer connected")]
    PeerGone(PeerId),

    /// No desired state has been loaded yet
    #[error("no desired state loaded yet")]
    NoDesiredState,
}

/// Errors on a peer's transport connection
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Peer did not open within the handshake timeout
    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// Peer closed the connection before opening
    #[error("Connection closed before open")]
    ClosedBeforeOpen,

    /// Peer sent something other than `open` first
    #[error("Expected open frame, got {0}")]
    UnexpectedFrame(&'static str),

    /// Wire protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Errors loading a desired-state document
#[derive(Error, Debug)]
pub enum DesiredStateError {
    /// Source could not be read
    #[error("could not read {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document is not valid JSON
    #[error("could not parse desired state: {0}")]
    Parse(#[from] serde_json::Error),

    /// Top level is not a mapping of unit names
    #[error("desired state must be an object mapping unit names to specifications")]
    NotAMapping,

    /// A unit specification is not an object
    #[error("unit {0} must be an object")]
    InvalidUnit(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl DesiredStateError {
    /// Whether the source itself was unreadable, as opposed to malformed
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DesiredStateError::Unavailable { .. })
    }
}
