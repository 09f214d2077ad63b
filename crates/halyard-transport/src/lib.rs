//! # HALYARD Transport
//!
//! Receive side of the HALYARD messaging transport.
//!
//! This crate provides:
//! - An adaptive poller over a dynamic set of datagram transports
//! - Frame classification and dispatch to channel endpoints
//! - `mio`-backed readiness multiplexing
//! - Non-blocking UDP channel transports with multicast support
//!
//! ## Example
//!
//! ```no_run
//! use halyard_transport::{
//!     DataTransportPoller, LoggingErrorHandler, PollerConfig, UdpChannelTransport,
//! };
//! use std::sync::Arc;
//!
//! # fn endpoint() -> Arc<dyn halyard_transport::ReceiveChannelEndpoint> { unimplemented!() }
//! let mut poller = DataTransportPoller::new(PollerConfig::default(), Arc::new(LoggingErrorHandler))?;
//! let transport = Arc::new(UdpChannelTransport::bind(([127, 0, 0, 1], 40456))?);
//! poller.register_for_read(endpoint(), transport, 0)?;
//!
//! loop {
//!     let bytes = poller.poll_transports()?;
//!     if bytes == 0 {
//!         std::thread::yield_now();
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod conductor;
pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod error_handler;
pub mod multiplexer;
pub mod poller;
pub mod registry;
pub mod transport;
pub mod udp;

#[cfg(test)]
mod test_support;

pub use buffer::{CACHE_LINE_LENGTH, FrameBuffer, MAX_UDP_PAYLOAD_LENGTH};
pub use conductor::{ConductorCommand, ConductorProxy};
pub use config::{Config, ConfigError, PollerConfig, UdpTransportConfig};
pub use endpoint::ReceiveChannelEndpoint;
pub use error::{EndpointError, PollerError, PollerResult};
pub use error_handler::{CountedErrorHandler, ErrorHandler, LoggingErrorHandler};
pub use multiplexer::{ManualMultiplexer, MioMultiplexer, Multiplexer};
pub use poller::{DataTransportPoller, PollerStats, TransportPoller};
pub use registry::{Registration, RegistrationToken};
pub use transport::{ReceiveTransport, TransportError, TransportResult, TransportStats};
pub use udp::UdpChannelTransport;
