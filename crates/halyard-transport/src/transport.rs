//! Receive transport abstraction.
//!
//! A transport is one datagram socket that frames for a channel arrive on.
//! The poller never binds, sends or configures sockets; it only asks a
//! transport to receive into the shared [`FrameBuffer`] and to expose the
//! descriptor the multiplexer watches for readability.

use std::io;
use std::net::SocketAddr;
use std::os::fd::RawFd;

use crate::buffer::FrameBuffer;

/// Transport layer errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// I/O error from underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Transport is closed
    #[error("Transport is closed")]
    Closed,

    /// Address binding failed
    #[error("Failed to bind to address: {0}")]
    BindFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<TransportError> for io::Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Io(e) => e,
            TransportError::Closed => {
                io::Error::new(io::ErrorKind::NotConnected, "transport is closed")
            }
            other => io::Error::other(other),
        }
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Non-blocking datagram source polled by a
/// [`DataTransportPoller`](crate::poller::DataTransportPoller).
///
/// Implementations must never block in [`ReceiveTransport::receive`].
pub trait ReceiveTransport: Send + Sync {
    /// Receive at most one datagram into `buffer`.
    ///
    /// Returns the sender's address and leaves the datagram length in the
    /// buffer's cursor. Returns `None` when nothing is pending, and also on
    /// receive failures: a failing socket is treated as idle for this tick.
    fn receive(&self, buffer: &mut FrameBuffer) -> Option<SocketAddr>;

    /// Descriptor the readiness multiplexer observes.
    ///
    /// # Errors
    /// Returns `TransportError::Closed` once the transport has been closed.
    fn receive_fd(&self) -> TransportResult<RawFd>;

    /// Check if the transport is closed.
    fn is_closed(&self) -> bool;

    /// Get transport statistics (optional).
    fn stats(&self) -> TransportStats {
        TransportStats::default()
    }
}

/// Transport receive statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Total bytes received
    pub bytes_received: u64,
    /// Total datagrams received
    pub packets_received: u64,
    /// Receive errors
    pub recv_errors: u64,
}

impl TransportStats {
    /// Create new empty statistics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful receive
    pub fn record_recv(&mut self, bytes: usize) {
        self.bytes_received += bytes as u64;
        self.packets_received += 1;
    }

    /// Record a receive error
    pub fn record_recv_error(&mut self) {
        self.recv_errors += 1;
    }
}
