//! Endpoints and transports for driving a poller from tests and benches.

use halyard_protocol::{DataHeader, FrameBuilder, FrameType, RttMeasurementHeader, SetupHeader};
use halyard_transport::{
    ConductorProxy, EndpointError, FrameBuffer, ReceiveChannelEndpoint, ReceiveTransport,
    TransportResult,
};
use std::collections::VecDeque;
use std::net::{SocketAddr, UdpSocket};
use std::os::fd::RawFd;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::time::Instant;

/// How a [`CountingEndpoint`] accounts for data frames
#[derive(Debug, Clone, Copy)]
pub enum DataAccounting {
    /// Count the whole datagram
    FrameLength,
    /// Count the payload after the data header
    PayloadLength,
    /// Count a fixed amount per frame
    Fixed(usize),
}

/// Endpoint counting frames per type and remembering data sessions
pub struct CountingEndpoint {
    accounting: DataAccounting,
    data: AtomicUsize,
    setups: AtomicUsize,
    rtts: AtomicUsize,
    closes: AtomicUsize,
    closed: AtomicBool,
    sessions: Mutex<Vec<(i32, usize)>>,
    re_resolution_checks: Mutex<Vec<Instant>>,
}

impl CountingEndpoint {
    /// Create an endpoint using the given accounting
    pub fn new(accounting: DataAccounting) -> Self {
        Self {
            accounting,
            data: AtomicUsize::new(0),
            setups: AtomicUsize::new(0),
            rtts: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            sessions: Mutex::new(Vec::new()),
            re_resolution_checks: Mutex::new(Vec::new()),
        }
    }

    /// Data and PAD frames handled
    pub fn data_count(&self) -> usize {
        self.data.load(Ordering::Relaxed)
    }

    /// SETUP frames handled
    pub fn setup_count(&self) -> usize {
        self.setups.load(Ordering::Relaxed)
    }

    /// RTT measurement frames handled
    pub fn rtt_count(&self) -> usize {
        self.rtts.load(Ordering::Relaxed)
    }

    /// Times `close` was called
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::Relaxed)
    }

    /// (session id, transport index) of every data frame, in arrival order
    pub fn sessions(&self) -> Vec<(i32, usize)> {
        self.sessions.lock().unwrap().clone()
    }

    /// Timestamps passed to re-resolution checks
    pub fn re_resolution_checks(&self) -> Vec<Instant> {
        self.re_resolution_checks.lock().unwrap().clone()
    }
}

impl ReceiveChannelEndpoint for CountingEndpoint {
    fn on_data_packet(&self, header: DataHeader<'_>, _src: SocketAddr, transport_index: usize) -> usize {
        self.data.fetch_add(1, Ordering::Relaxed);
        self.sessions
            .lock()
            .unwrap()
            .push((header.session_id(), transport_index));
        match self.accounting {
            DataAccounting::FrameLength => header.as_bytes().len(),
            DataAccounting::PayloadLength => header.payload().len(),
            DataAccounting::Fixed(bytes) => bytes,
        }
    }

    fn on_setup_message(&self, _header: SetupHeader<'_>, _src: SocketAddr, _transport_index: usize) {
        self.setups.fetch_add(1, Ordering::Relaxed);
    }

    fn on_rtt_measurement(
        &self,
        _header: RttMeasurementHeader<'_>,
        _src: SocketAddr,
        _transport_index: usize,
    ) {
        self.rtts.fetch_add(1, Ordering::Relaxed);
    }

    fn close(&self) -> Result<(), EndpointError> {
        self.closes.fetch_add(1, Ordering::Relaxed);
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(EndpointError::AlreadyClosed);
        }
        Ok(())
    }

    fn check_for_re_resolution(&self, now: Instant, _conductor: &ConductorProxy) {
        self.re_resolution_checks.lock().unwrap().push(now);
    }
}

static NEXT_FAKE_FD: AtomicI32 = AtomicI32::new(20_000);

/// In-memory transport for use with a manually driven multiplexer
pub struct QueueTransport {
    queue: Mutex<VecDeque<Vec<u8>>>,
    attempts: AtomicUsize,
    fd: RawFd,
}

impl QueueTransport {
    /// Create an empty transport with a unique fake descriptor
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            attempts: AtomicUsize::new(0),
            fd: NEXT_FAKE_FD.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Queue a datagram
    pub fn push(&self, frame: Vec<u8>) {
        self.queue.lock().unwrap().push_back(frame);
    }

    /// Receive attempts so far
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl Default for QueueTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveTransport for QueueTransport {
    fn receive(&self, buffer: &mut FrameBuffer) -> Option<SocketAddr> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let frame = self.queue.lock().unwrap().pop_front()?;
        let len = frame.len().min(buffer.capacity());
        buffer.receive_region()[..len].copy_from_slice(&frame[..len]);
        buffer.set_len(len);
        Some(SocketAddr::from(([127, 0, 0, 1], 40001)))
    }

    fn receive_fd(&self) -> TransportResult<RawFd> {
        Ok(self.fd)
    }

    fn is_closed(&self) -> bool {
        false
    }
}

/// Data frame for `session_id` carrying `payload_len` bytes
pub fn data_frame(session_id: i32, payload_len: usize) -> Vec<u8> {
    FrameBuilder::new(FrameType::Data)
        .session_id(session_id)
        .stream_id(1001)
        .term_id(7)
        .payload(&vec![0x5A; payload_len])
        .build()
}

/// Send every frame from `socket` to `dest`
pub fn send_frames(socket: &UdpSocket, dest: SocketAddr, frames: &[Vec<u8>]) {
    for frame in frames {
        socket.send_to(frame, dest).unwrap();
    }
}
