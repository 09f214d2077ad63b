//! Scripted transports and recording endpoints for unit tests.

use halyard_protocol::{DataHeader, RttMeasurementHeader, SetupHeader, is_valid_header};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::buffer::FrameBuffer;
use crate::conductor::ConductorProxy;
use crate::endpoint::ReceiveChannelEndpoint;
use crate::error::EndpointError;
use crate::poller::TransportPoller;
use crate::transport::{ReceiveTransport, TransportError, TransportResult};

static NEXT_FAKE_FD: AtomicI32 = AtomicI32::new(10_000);

/// Transport replaying queued datagrams and counting receive attempts
pub struct ScriptedTransport {
    queue: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
    attempts: AtomicUsize,
    fd: RawFd,
    closed: AtomicBool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            attempts: AtomicUsize::new(0),
            fd: NEXT_FAKE_FD.fetch_add(1, Ordering::Relaxed),
            closed: AtomicBool::new(false),
        }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn push(&self, frame: Vec<u8>) {
        self.push_from(frame, "127.0.0.1:40001".parse().unwrap());
    }

    pub fn push_from(&self, frame: Vec<u8>, src: SocketAddr) {
        self.queue.lock().unwrap().push_back((frame, src));
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

impl ReceiveTransport for ScriptedTransport {
    fn receive(&self, buffer: &mut FrameBuffer) -> Option<SocketAddr> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let (frame, src) = self.queue.lock().unwrap().pop_front()?;
        let region = buffer.receive_region();
        region[..frame.len()].copy_from_slice(&frame);
        buffer.set_len(frame.len());
        Some(src)
    }

    fn receive_fd(&self) -> TransportResult<RawFd> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        Ok(self.fd)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

/// Endpoint recording every callback it receives
#[derive(Default)]
pub struct RecordingEndpoint {
    data_result: usize,
    reject_all: bool,
    fail_close: bool,
    fail_multi_close: bool,
    re_resolve: Option<(String, SocketAddr)>,
    destinations: Vec<Arc<ScriptedTransport>>,
    hooks: AtomicUsize,
    data: AtomicUsize,
    setups: AtomicUsize,
    rtts: AtomicUsize,
    closes: AtomicUsize,
    multi_closes: AtomicUsize,
    last_transport_index: Mutex<Option<usize>>,
    re_resolutions: Mutex<Vec<Instant>>,
}

impl RecordingEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes reported for every data frame
    pub fn with_data_result(mut self, bytes: usize) -> Self {
        self.data_result = bytes;
        self
    }

    pub fn rejecting_all(mut self) -> Self {
        self.reject_all = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn failing_multi_close(mut self) -> Self {
        self.fail_multi_close = true;
        self
    }

    /// Request endpoint re-resolution on every check
    pub fn re_resolving(mut self, name: &str, address: SocketAddr) -> Self {
        self.re_resolve = Some((name.to_string(), address));
        self
    }

    /// Extra transport cancelled when multi-destination resources close
    pub fn with_destination(mut self, transport: Arc<ScriptedTransport>) -> Self {
        self.destinations.push(transport);
        self
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.load(Ordering::Relaxed)
    }

    pub fn data_count(&self) -> usize {
        self.data.load(Ordering::Relaxed)
    }

    pub fn setup_count(&self) -> usize {
        self.setups.load(Ordering::Relaxed)
    }

    pub fn rtt_count(&self) -> usize {
        self.rtts.load(Ordering::Relaxed)
    }

    pub fn total_callbacks(&self) -> usize {
        self.data_count() + self.setup_count() + self.rtt_count()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::Relaxed)
    }

    pub fn multi_close_count(&self) -> usize {
        self.multi_closes.load(Ordering::Relaxed)
    }

    pub fn last_transport_index(&self) -> Option<usize> {
        *self.last_transport_index.lock().unwrap()
    }

    pub fn re_resolution_times(&self) -> Vec<Instant> {
        self.re_resolutions.lock().unwrap().clone()
    }

    fn record_index(&self, transport_index: usize) {
        *self.last_transport_index.lock().unwrap() = Some(transport_index);
    }
}

impl ReceiveChannelEndpoint for RecordingEndpoint {
    fn is_valid_frame(&self, frame: &[u8]) -> bool {
        !self.reject_all && is_valid_header(frame)
    }

    fn receive_hook(&self, _frame: &[u8], _src: SocketAddr) {
        self.hooks.fetch_add(1, Ordering::Relaxed);
    }

    fn on_data_packet(&self, _header: DataHeader<'_>, _src: SocketAddr, transport_index: usize) -> usize {
        self.data.fetch_add(1, Ordering::Relaxed);
        self.record_index(transport_index);
        self.data_result
    }

    fn on_setup_message(&self, _header: SetupHeader<'_>, _src: SocketAddr, transport_index: usize) {
        self.setups.fetch_add(1, Ordering::Relaxed);
        self.record_index(transport_index);
    }

    fn on_rtt_measurement(
        &self,
        _header: RttMeasurementHeader<'_>,
        _src: SocketAddr,
        transport_index: usize,
    ) {
        self.rtts.fetch_add(1, Ordering::Relaxed);
        self.record_index(transport_index);
    }

    fn close_multi_rcv_destination(
        &self,
        poller: &mut dyn TransportPoller,
    ) -> Result<(), EndpointError> {
        self.multi_closes.fetch_add(1, Ordering::Relaxed);
        for transport in &self.destinations {
            poller.cancel_read(self, transport.as_ref());
        }
        if self.fail_multi_close {
            return Err(EndpointError::Other("destination close failed".to_string()));
        }
        Ok(())
    }

    fn close(&self) -> Result<(), EndpointError> {
        self.closes.fetch_add(1, Ordering::Relaxed);
        if self.fail_close {
            return Err(EndpointError::Other("endpoint close failed".to_string()));
        }
        Ok(())
    }

    fn check_for_re_resolution(&self, now: Instant, conductor: &ConductorProxy) {
        self.re_resolutions.lock().unwrap().push(now);
        if let Some((name, address)) = &self.re_resolve {
            conductor.re_resolve_endpoint(name, 0, *address);
        }
    }
}

/// Endpoint that is also its own single transport
pub struct SelfTransportEndpoint {
    endpoint: RecordingEndpoint,
    transport: ScriptedTransport,
}

impl SelfTransportEndpoint {
    pub fn new(data_result: usize) -> Self {
        Self {
            endpoint: RecordingEndpoint::new().with_data_result(data_result),
            transport: ScriptedTransport::new(),
        }
    }

    pub fn transport(&self) -> &ScriptedTransport {
        &self.transport
    }
}

impl ReceiveChannelEndpoint for SelfTransportEndpoint {
    fn on_data_packet(&self, header: DataHeader<'_>, src: SocketAddr, transport_index: usize) -> usize {
        self.endpoint.on_data_packet(header, src, transport_index)
    }

    fn on_setup_message(&self, header: SetupHeader<'_>, src: SocketAddr, transport_index: usize) {
        self.endpoint.on_setup_message(header, src, transport_index);
    }

    fn on_rtt_measurement(
        &self,
        header: RttMeasurementHeader<'_>,
        src: SocketAddr,
        transport_index: usize,
    ) {
        self.endpoint.on_rtt_measurement(header, src, transport_index);
    }

    fn close(&self) -> Result<(), EndpointError> {
        self.endpoint.close()
    }
}

impl ReceiveTransport for SelfTransportEndpoint {
    fn receive(&self, buffer: &mut FrameBuffer) -> Option<SocketAddr> {
        self.transport.receive(buffer)
    }

    fn receive_fd(&self) -> TransportResult<RawFd> {
        self.transport.receive_fd()
    }

    fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }
}
