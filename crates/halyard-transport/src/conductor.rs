//! Command queue from the receiver thread to the conductor.
//!
//! Endpoints decide when a peer address needs re-resolving; the conductor
//! thread owns name resolution. [`ConductorProxy`] carries the request across
//! without blocking the receiver.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Default queue capacity
pub const DEFAULT_COMMAND_CAPACITY: usize = 1024;

/// Requests the receiver side escalates to the conductor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConductorCommand {
    /// Re-resolve the endpoint name of a receive channel
    ReResolveEndpoint {
        /// Endpoint name as configured on the channel
        endpoint: String,
        /// Registration ID of the channel endpoint
        channel_id: u64,
        /// Address currently in use
        address: SocketAddr,
    },
    /// Re-resolve the control address of a receive channel
    ReResolveControl {
        /// Control name as configured on the channel
        control: String,
        /// Registration ID of the channel endpoint
        channel_id: u64,
        /// Address currently in use
        address: SocketAddr,
    },
}

/// Non-blocking sender half of the conductor command queue
#[derive(Debug, Clone)]
pub struct ConductorProxy {
    tx: Sender<ConductorCommand>,
    dropped: Arc<AtomicU64>,
}

impl ConductorProxy {
    /// Create a proxy and the conductor's receiving end
    pub fn bounded(capacity: usize) -> (Self, Receiver<ConductorCommand>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Ask the conductor to re-resolve an endpoint name.
    ///
    /// Returns `false` if the request could not be queued.
    pub fn re_resolve_endpoint(&self, endpoint: &str, channel_id: u64, address: SocketAddr) -> bool {
        self.offer(ConductorCommand::ReResolveEndpoint {
            endpoint: endpoint.to_string(),
            channel_id,
            address,
        })
    }

    /// Ask the conductor to re-resolve a control address.
    ///
    /// Returns `false` if the request could not be queued.
    pub fn re_resolve_control(&self, control: &str, channel_id: u64, address: SocketAddr) -> bool {
        self.offer(ConductorCommand::ReResolveControl {
            control: control.to_string(),
            channel_id,
            address,
        })
    }

    /// Requests dropped because the queue was full or disconnected
    pub fn dropped_commands(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn offer(&self, command: ConductorCommand) -> bool {
        match self.tx.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(command)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(?command, "Conductor command queue full, dropping request");
                false
            }
            Err(TrySendError::Disconnected(command)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(?command, "Conductor has gone away, dropping request");
                false
            }
        }
    }
}
