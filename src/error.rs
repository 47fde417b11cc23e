//! Error types for the MSB client

use thiserror::Error;

/// Errors that can occur when using the MSB client
#[derive(Error, Debug)]
pub enum MsbError {
    /// The broker URL could not be resolved into an endpoint
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A data-format schema or payload string was not valid JSON
    #[error("Invalid schema: {0}")]
    InvalidSchema(#[from] serde_json::Error),

    /// An event, function or configuration parameter with this id already exists
    #[error("Duplicate {kind}: {id}")]
    DuplicateEntry { kind: &'static str, id: String },

    /// No event, function or configuration parameter with this id exists
    #[error("Unknown {kind}: {id}")]
    UnknownEntry { kind: &'static str, id: String },

    /// A configuration parameter was rebound to a value of a different kind
    #[error("Type mismatch for configuration parameter {0}")]
    TypeMismatch(String),

    /// WebSocket transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Not currently connected to the broker
    #[error("Not connected")]
    NotConnected,

    /// TLS material could not be loaded or applied
    #[error("TLS error: {0}")]
    Tls(String),

    /// The state machine is already running
    #[error("State machine already running")]
    AlreadyRunning,

    /// The state machine is not running
    #[error("State machine not running")]
    NotRunning,

    /// The state machine thread panicked before it could be joined
    #[error("State machine thread panicked")]
    WorkerPanicked,

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for MSB client operations
pub type Result<T> = std::result::Result<T, MsbError>;
