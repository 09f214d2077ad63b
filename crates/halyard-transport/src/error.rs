//! Error types for the data transport poller.

use std::io;
use thiserror::Error;

use crate::config::ConfigError;
use crate::transport::TransportError;

/// Poller errors
#[derive(Debug, Error)]
pub enum PollerError {
    /// Transport could not be attached to the multiplexer
    #[error("failed to register transport: {0}")]
    Register(#[source] io::Error),

    /// The (endpoint, transport) pair is already registered
    #[error("transport already registered for this endpoint")]
    AlreadyRegistered,

    /// The readiness multiplexer itself failed
    #[error("multiplexer failure: {0}")]
    Multiplexer(#[source] io::Error),

    /// Closing an endpoint's multi-destination resources failed
    #[error("failed to close multi-destination resources: {0}")]
    MultiDestinationClose(#[source] EndpointError),

    /// Closing an endpoint failed
    #[error("failed to close endpoint: {0}")]
    EndpointClose(#[source] EndpointError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The poller has been closed
    #[error("poller is closed")]
    Closed,
}

/// Result type for poller operations
pub type PollerResult<T> = Result<T, PollerError>;

/// Errors reported by channel endpoints while closing
#[derive(Debug, Error)]
pub enum EndpointError {
    /// I/O error while releasing a resource
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Transport error while releasing a transport
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Endpoint was already closed
    #[error("endpoint already closed")]
    AlreadyClosed,

    /// Endpoint-specific failure
    #[error("{0}")]
    Other(String),
}
