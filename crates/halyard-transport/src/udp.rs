//! UDP channel transport.
//!
//! A non-blocking UDP socket that frames for one channel arrive on. Built
//! with `socket2` so receive buffer size and multicast membership can be set
//! before binding.

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

use crate::buffer::FrameBuffer;
use crate::config::UdpTransportConfig;
use crate::transport::{ReceiveTransport, TransportError, TransportResult, TransportStats};

/// UDP transport for one channel
///
/// Receives are non-blocking and land directly in the poller's shared
/// [`FrameBuffer`]. Closing marks the transport unusable; the descriptor is
/// released when the transport is dropped.
pub struct UdpChannelTransport {
    socket: UdpSocket,
    closed: AtomicBool,
    recv_buffer_size: usize,
    bytes_received: AtomicU64,
    packets_received: AtomicU64,
    recv_errors: AtomicU64,
}

impl UdpChannelTransport {
    /// Create a new UDP transport bound to the given address
    ///
    /// # Arguments
    /// * `addr` - The local address to bind to. Use "0.0.0.0:0" for automatic port selection.
    ///
    /// # Examples
    /// ```no_run
    /// use halyard_transport::udp::UdpChannelTransport;
    /// use std::net::SocketAddr;
    ///
    /// let addr: SocketAddr = "127.0.0.1:40123".parse().unwrap();
    /// let transport = UdpChannelTransport::bind(addr).unwrap();
    /// println!("Listening on {}", transport.local_addr().unwrap());
    /// ```
    pub fn bind<A: Into<SocketAddr>>(addr: A) -> TransportResult<Self> {
        let config = UdpTransportConfig {
            bind_addr: addr.into().to_string(),
            ..UdpTransportConfig::default()
        };
        Self::open(&config)
    }

    /// Create a transport from configuration
    ///
    /// # Errors
    /// Returns `TransportError::InvalidConfig` for an unusable configuration,
    /// `TransportError::BindFailed` if the address cannot be bound, and
    /// `TransportError::Io` for socket option failures.
    pub fn open(config: &UdpTransportConfig) -> TransportResult<Self> {
        config
            .validate()
            .map_err(|e| TransportError::InvalidConfig(e.to_string()))?;
        let addr = config
            .parse_bind_addr()
            .map_err(|e| TransportError::InvalidConfig(e.to_string()))?;

        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket2 = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket2.set_nonblocking(true)?;

        if let Some(size) = config.recv_buffer_size {
            socket2.set_recv_buffer_size(size)?;
        }

        if config.multicast_group.is_some() {
            socket2.set_reuse_address(true)?;
        }

        // Kernel may round the requested size
        let recv_buffer_size = socket2.recv_buffer_size()?;

        socket2
            .bind(&SockAddr::from(addr))
            .map_err(|e| TransportError::BindFailed(format!("{addr}: {e}")))?;

        if let Some(group) = config.multicast_group {
            socket2.join_multicast_v4(&group, &config.multicast_interface)?;
            info!(%group, interface = %config.multicast_interface, "Joined multicast group");
        }

        let socket: UdpSocket = socket2.into();
        debug!(
            local_addr = ?socket.local_addr().ok(),
            recv_buffer_size,
            "UDP channel transport bound"
        );

        Ok(Self {
            socket,
            closed: AtomicBool::new(false),
            recv_buffer_size,
            bytes_received: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            recv_errors: AtomicU64::new(0),
        })
    }

    /// Get the local address this socket is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Get the receive buffer size in bytes as set by the kernel
    pub fn recv_buffer_size(&self) -> usize {
        self.recv_buffer_size
    }

    /// Mark the transport closed.
    ///
    /// Subsequent receives return nothing and registration with a multiplexer
    /// fails. Closing twice is harmless.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(local_addr = ?self.socket.local_addr().ok(), "UDP channel transport closed");
        }
    }
}

impl ReceiveTransport for UdpChannelTransport {
    fn receive(&self, buffer: &mut FrameBuffer) -> Option<SocketAddr> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }

        match self.socket.recv_from(buffer.receive_region()) {
            Ok((len, src)) => {
                buffer.set_len(len);
                self.packets_received.fetch_add(1, Ordering::Relaxed);
                self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
                Some(src)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(_) => {
                self.recv_errors.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn receive_fd(&self) -> TransportResult<RawFd> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        Ok(self.socket.as_raw_fd())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn stats(&self) -> TransportStats {
        TransportStats {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for UdpChannelTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpChannelTransport")
            .field("local_addr", &self.socket.local_addr().ok())
            .field("closed", &self.is_closed())
            .finish()
    }
}
