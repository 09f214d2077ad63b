//! Adaptive data transport poller.
//!
//! Each call to [`DataTransportPoller::poll_transports`] is one tick of the
//! receiver thread. With few registered transports every socket is tried
//! directly, since an empty non-blocking receive is cheaper than a readiness
//! syscall. Once the registry grows past the iteration threshold the
//! multiplexer is consulted and only ready sockets are read.
//!
//! At most one datagram is read per transport per tick; the caller drains
//! deeper queues by ticking again.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::buffer::FrameBuffer;
use crate::conductor::ConductorProxy;
use crate::config::PollerConfig;
use crate::dispatch::poll_registration;
use crate::endpoint::ReceiveChannelEndpoint;
use crate::error::{PollerError, PollerResult};
use crate::error_handler::ErrorHandler;
use crate::multiplexer::{MioMultiplexer, Multiplexer};
use crate::registry::{Registration, RegistrationToken, TransportRegistry};
use crate::transport::ReceiveTransport;

/// Poll loop counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    /// Datagrams received from any transport
    pub datagrams_received: u64,
    /// DATA and PAD frames dispatched
    pub data_frames: u64,
    /// SETUP frames dispatched
    pub setup_frames: u64,
    /// RTT measurement frames dispatched
    pub rtt_frames: u64,
    /// Datagrams rejected by endpoint validation
    pub invalid_frames: u64,
    /// Valid datagrams too short for their typed header
    pub truncated_frames: u64,
    /// Valid datagrams with a type the poller does not route
    pub unknown_frames: u64,
    /// Bytes counted by endpoints for data frames
    pub bytes_received: u64,
    /// Ticks polled by direct iteration
    pub direct_polls: u64,
    /// Ticks polled through the multiplexer
    pub multiplexed_polls: u64,
}

/// Registration surface handed to endpoints during shutdown
pub trait TransportPoller {
    /// Start polling `transport` for `endpoint`.
    ///
    /// # Errors
    /// Returns `PollerError::Register` if the transport cannot be attached to
    /// the multiplexer and `PollerError::AlreadyRegistered` for a duplicate
    /// pair. Nothing is registered on failure.
    ///
    /// A descriptor is watched once, so a transport already registered under
    /// another endpoint is refused with `PollerError::Register`. Share a
    /// transport by routing through one endpoint.
    fn register_for_read(
        &mut self,
        endpoint: Arc<dyn ReceiveChannelEndpoint>,
        transport: Arc<dyn ReceiveTransport>,
        transport_index: usize,
    ) -> PollerResult<RegistrationToken>;

    /// Stop polling the pair matching both identities. No-op if absent.
    fn cancel_read(&mut self, endpoint: &dyn ReceiveChannelEndpoint, transport: &dyn ReceiveTransport);
}

/// Receive-side poller over a dynamic set of transports
pub struct DataTransportPoller<M: Multiplexer = MioMultiplexer> {
    config: PollerConfig,
    registry: TransportRegistry,
    multiplexer: M,
    buffer: FrameBuffer,
    stats: PollerStats,
    error_handler: Arc<dyn ErrorHandler>,
    closed: bool,
}

impl DataTransportPoller<MioMultiplexer> {
    /// Create a poller backed by the OS readiness selector
    ///
    /// # Errors
    /// Returns `PollerError::Config` for invalid configuration and
    /// `PollerError::Multiplexer` if the selector cannot be created.
    pub fn new(config: PollerConfig, error_handler: Arc<dyn ErrorHandler>) -> PollerResult<Self> {
        config.validate()?;
        let multiplexer = MioMultiplexer::new(config.max_events).map_err(PollerError::Multiplexer)?;
        Ok(Self::with_multiplexer(config, multiplexer, error_handler))
    }
}

impl<M: Multiplexer> DataTransportPoller<M> {
    /// Create a poller over the given multiplexer
    pub fn with_multiplexer(
        config: PollerConfig,
        multiplexer: M,
        error_handler: Arc<dyn ErrorHandler>,
    ) -> Self {
        Self {
            config,
            registry: TransportRegistry::new(),
            multiplexer,
            buffer: FrameBuffer::new(),
            stats: PollerStats::default(),
            error_handler,
            closed: false,
        }
    }

    /// Run one tick: receive at most one datagram per candidate transport and
    /// dispatch it.
    ///
    /// Returns the bytes endpoints counted for data frames this tick.
    ///
    /// # Errors
    /// Returns `PollerError::Multiplexer` if the readiness check itself fails
    /// and `PollerError::Closed` after [`DataTransportPoller::close`].
    pub fn poll_transports(&mut self) -> PollerResult<usize> {
        if self.closed {
            return Err(PollerError::Closed);
        }

        if self.registry.len() <= self.config.iteration_threshold {
            self.poll_direct()
        } else {
            self.poll_multiplexed()
        }
    }

    fn poll_direct(&mut self) -> PollerResult<usize> {
        self.stats.direct_polls += 1;

        let entries = self.registry.snapshot();
        let mut bytes_received = 0;
        for registration in entries.iter() {
            if let Some(bytes) = poll_registration(registration, &mut self.buffer, &mut self.stats) {
                bytes_received += bytes;
            }
        }

        Ok(bytes_received)
    }

    fn poll_multiplexed(&mut self) -> PollerResult<usize> {
        self.stats.multiplexed_polls += 1;

        self.multiplexer
            .select_now()
            .map_err(PollerError::Multiplexer)?;

        let mut bytes_received = 0;
        for i in 0..self.multiplexer.ready().len() {
            let token = self.multiplexer.ready()[i];
            // Readiness can outlive a registration cancelled earlier this tick
            let Some(registration) = self.registry.attachment(token) else {
                continue;
            };

            if let Some(bytes) = poll_registration(registration, &mut self.buffer, &mut self.stats) {
                bytes_received += bytes;
                self.multiplexer.retain_ready(token);
            }
        }
        self.multiplexer.reset();

        Ok(bytes_received)
    }

    /// Start polling `transport` for `endpoint`
    ///
    /// # Errors
    /// Returns `PollerError::Register` if the transport is closed or cannot
    /// be attached to the multiplexer, `PollerError::AlreadyRegistered` for a
    /// duplicate pair and `PollerError::Closed` after close.
    ///
    /// The multiplexer watches each descriptor once. Registering a transport
    /// that is already registered under a different endpoint fails with
    /// `PollerError::Register` (`AlreadyExists` for [`ManualMultiplexer`],
    /// `EEXIST` from the OS selector) and leaves the first registration intact.
    ///
    /// [`ManualMultiplexer`]: crate::multiplexer::ManualMultiplexer
    pub fn register_for_read(
        &mut self,
        endpoint: Arc<dyn ReceiveChannelEndpoint>,
        transport: Arc<dyn ReceiveTransport>,
        transport_index: usize,
    ) -> PollerResult<RegistrationToken> {
        if self.closed {
            return Err(PollerError::Closed);
        }
        if self
            .registry
            .position(endpoint.as_ref(), transport.as_ref())
            .is_some()
        {
            return Err(PollerError::AlreadyRegistered);
        }

        let fd = transport
            .receive_fd()
            .map_err(|e| PollerError::Register(e.into()))?;
        let token = self.registry.vacant_token();
        self.multiplexer
            .register(fd, token)
            .map_err(PollerError::Register)?;

        let registration = Arc::new(Registration::new(
            endpoint,
            transport,
            transport_index,
            token,
            fd,
        ));
        self.registry.insert(registration);

        debug!(
            fd,
            transport_index,
            token = token.0,
            registered = self.registry.len(),
            "Transport registered"
        );
        Ok(RegistrationToken(token))
    }

    /// Stop polling the pair matching both identities. No-op if absent.
    pub fn cancel_read(&mut self, endpoint: &dyn ReceiveChannelEndpoint, transport: &dyn ReceiveTransport) {
        let Some(index) = self.registry.position(endpoint, transport) else {
            return;
        };
        let Some(registration) = self.registry.remove(index) else {
            return;
        };

        // The selector drops descriptors on its own once they are closed
        if let Err(e) = self
            .multiplexer
            .deregister(registration.fd(), registration.token())
        {
            debug!(fd = registration.fd(), error = %e, "Deregistration failed");
        }

        debug!(
            fd = registration.fd(),
            transport_index = registration.transport_index(),
            registered = self.registry.len(),
            "Transport cancelled"
        );
    }

    /// Register an endpoint that is its own single transport, at index 0
    ///
    /// # Errors
    /// As [`DataTransportPoller::register_for_read`].
    pub fn register_endpoint<E>(&mut self, endpoint: Arc<E>) -> PollerResult<RegistrationToken>
    where
        E: ReceiveChannelEndpoint + ReceiveTransport + 'static,
    {
        let transport: Arc<dyn ReceiveTransport> = endpoint.clone();
        self.register_for_read(endpoint, transport, 0)
    }

    /// Cancel an endpoint registered with [`DataTransportPoller::register_endpoint`]
    pub fn cancel_endpoint<E>(&mut self, endpoint: &E)
    where
        E: ReceiveChannelEndpoint + ReceiveTransport,
    {
        self.cancel_read(endpoint, endpoint);
    }

    /// Ask every registered endpoint whether its peer address needs
    /// re-resolving.
    ///
    /// Visits each registration once; endpoints escalate through `conductor`.
    pub fn check_for_re_resolutions(&self, now: Instant, conductor: &ConductorProxy) {
        for registration in self.registry.snapshot().iter() {
            registration
                .endpoint()
                .check_for_re_resolution(now, conductor);
        }
    }

    /// Run a readiness check without receiving anything.
    ///
    /// Returns the number of sources that were ready. Their readiness is
    /// retained, so datagrams already queued are still read by the next
    /// multiplexed tick.
    ///
    /// # Errors
    /// Returns `PollerError::Multiplexer` if the readiness check fails and
    /// `PollerError::Closed` after close.
    pub fn select_now_without_processing(&mut self) -> PollerResult<usize> {
        if self.closed {
            return Err(PollerError::Closed);
        }
        let ready = self
            .multiplexer
            .select_now()
            .map_err(PollerError::Multiplexer)?;

        // Edge-triggered backends report these sources only once
        for i in 0..self.multiplexer.ready().len() {
            let token = self.multiplexer.ready()[i];
            self.multiplexer.retain_ready(token);
        }
        self.multiplexer.reset();
        Ok(ready)
    }

    /// Close every registered endpoint and release the multiplexer.
    ///
    /// For each registration in order, closes the endpoint's
    /// multi-destination transports and then the endpoint. Failures go to the
    /// error handler and never stop the sweep. Calling it again does nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let entries = self.registry.snapshot();
        let error_handler = Arc::clone(&self.error_handler);
        info!(registered = entries.len(), "Closing data transport poller");

        for registration in entries.iter() {
            let endpoint = Arc::clone(registration.endpoint());

            if let Err(e) = endpoint.close_multi_rcv_destination(&mut *self) {
                error_handler.on_error(
                    "close multi-destination transports",
                    &PollerError::MultiDestinationClose(e),
                );
            }

            if let Err(e) = endpoint.close() {
                error_handler.on_error("close endpoint", &PollerError::EndpointClose(e));
            }
        }

        if let Err(e) = self.multiplexer.close() {
            error_handler.on_error("close multiplexer", &PollerError::Multiplexer(e));
        }
        self.registry = TransportRegistry::new();

        info!("Data transport poller closed");
    }

    /// Whether [`DataTransportPoller::close`] has run
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of registered transports
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether no transports are registered
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Registrations in polling order
    pub fn registrations(&self) -> Arc<[Arc<Registration>]> {
        self.registry.snapshot()
    }

    /// Poll loop counters
    pub fn stats(&self) -> &PollerStats {
        &self.stats
    }

    /// Active configuration
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Change the registry size above which the multiplexer is used.
    ///
    /// Takes effect on the next tick.
    pub fn set_iteration_threshold(&mut self, threshold: usize) {
        self.config.iteration_threshold = threshold;
    }

    /// The readiness multiplexer
    pub fn multiplexer(&self) -> &M {
        &self.multiplexer
    }

    /// The readiness multiplexer, for driving it directly
    pub fn multiplexer_mut(&mut self) -> &mut M {
        &mut self.multiplexer
    }
}

impl<M: Multiplexer> TransportPoller for DataTransportPoller<M> {
    fn register_for_read(
        &mut self,
        endpoint: Arc<dyn ReceiveChannelEndpoint>,
        transport: Arc<dyn ReceiveTransport>,
        transport_index: usize,
    ) -> PollerResult<RegistrationToken> {
        DataTransportPoller::register_for_read(self, endpoint, transport, transport_index)
    }

    fn cancel_read(&mut self, endpoint: &dyn ReceiveChannelEndpoint, transport: &dyn ReceiveTransport) {
        DataTransportPoller::cancel_read(self, endpoint, transport);
    }
}

impl<M: Multiplexer> std::fmt::Debug for DataTransportPoller<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataTransportPoller")
            .field("config", &self.config)
            .field("registered", &self.registry.len())
            .field("stats", &self.stats)
            .field("closed", &self.closed)
            .finish()
    }
}
